//! In-memory transport serving canned responses.
//!
//! Used to drive the client, the cache and the dashboard without a server.
//! Every request is recorded, and responses for a path (or one exact
//! path + parameter set) can be held back until a [`Gate`] is released,
//! which makes request ordering deterministic in tests.

use super::Transport;
use crate::error::{Error, Result};
use crate::params::QueryParams;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

#[derive(Clone)]
enum Canned {
    Json(Value),
    Fail(Error),
}

/// One request seen by the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub path: String,
    pub params: QueryParams,
}

#[derive(Default)]
struct State {
    responses: DashMap<String, Canned>,
    gates: DashMap<String, Arc<watch::Sender<bool>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

/// Handle holding back responses until released.
pub struct Gate {
    open: Arc<watch::Sender<bool>>,
}

impl Gate {
    /// Let held and future requests through.
    pub fn release(&self) {
        self.open.send_replace(true);
    }
}

/// Thread-safe in-memory transport.
///
/// Exact `path?params` registrations take precedence over path-wide ones.
/// Unregistered paths answer `404 {"detail":"Not found."}`.
///
/// # Example
///
/// ```
/// use survey_monitor::client::{ApiClient, InMemoryTransport};
/// use serde_json::json;
///
/// # #[tokio::main] async fn main() {
/// let transport = InMemoryTransport::new();
/// transport.respond("regions/", json!([{"code_dr": "01", "nom_region": "DAKAR"}]));
///
/// let client = ApiClient::new(transport.clone());
/// let regions = client.regions().await.unwrap();
/// assert_eq!(regions[0].name, "DAKAR");
/// assert_eq!(transport.call_count("regions/"), 1);
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<State>,
}

fn request_key(path: &str, params: &QueryParams) -> String {
    format!("{}?{}", path, params.canonical())
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request to `path` with `body`.
    pub fn respond(&self, path: &str, body: Value) {
        self.state
            .responses
            .insert(path.to_string(), Canned::Json(body));
    }

    /// Answer requests to `path` with exactly `params` with `body`.
    pub fn respond_to(&self, path: &str, params: &QueryParams, body: Value) {
        self.state
            .responses
            .insert(request_key(path, params), Canned::Json(body));
    }

    /// Fail every request to `path` with `error`.
    pub fn fail(&self, path: &str, error: Error) {
        self.state
            .responses
            .insert(path.to_string(), Canned::Fail(error));
    }

    /// Fail requests to `path` with exactly `params` with `error`.
    pub fn fail_to(&self, path: &str, params: &QueryParams, error: Error) {
        self.state
            .responses
            .insert(request_key(path, params), Canned::Fail(error));
    }

    /// Hold every request to `path` until the returned gate is released.
    pub fn hold(&self, path: &str) -> Gate {
        self.install_gate(path.to_string())
    }

    /// Hold requests to `path` with exactly `params`.
    pub fn hold_request(&self, path: &str, params: &QueryParams) -> Gate {
        self.install_gate(request_key(path, params))
    }

    fn install_gate(&self, key: String) -> Gate {
        let (tx, _rx) = watch::channel(false);
        let open = Arc::new(tx);
        self.state.gates.insert(key, Arc::clone(&open));
        Gate { open }
    }

    /// All recorded requests, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state
            .calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of recorded requests to `path`, any parameters.
    pub fn call_count(&self, path: &str) -> usize {
        self.calls().iter().filter(|c| c.path == path).count()
    }

    pub fn reset_calls(&self) {
        self.state
            .calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn lookup_gate(&self, exact: &str, path: &str) -> Option<Arc<watch::Sender<bool>>> {
        self.state
            .gates
            .get(exact)
            .or_else(|| self.state.gates.get(path))
            .map(|gate| Arc::clone(gate.value()))
    }

    fn lookup_response(&self, exact: &str, path: &str) -> Option<Canned> {
        self.state
            .responses
            .get(exact)
            .or_else(|| self.state.responses.get(path))
            .map(|canned| canned.value().clone())
    }
}

impl Transport for InMemoryTransport {
    async fn get(&self, path: &str, params: &QueryParams) -> Result<Value> {
        self.state
            .calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCall {
                path: path.to_string(),
                params: params.clone(),
            });

        let exact = request_key(path, params);
        if let Some(gate) = self.lookup_gate(&exact, path) {
            let mut open = gate.subscribe();
            debug!("InMemory GET {} -> HELD", exact);
            let _ = open.wait_for(|released| *released).await;
        }

        match self.lookup_response(&exact, path) {
            Some(Canned::Json(body)) => {
                debug!("✓ InMemory GET {} -> 200", exact);
                Ok(body)
            }
            Some(Canned::Fail(error)) => {
                debug!("✗ InMemory GET {} -> {}", exact, error);
                Err(error)
            }
            None => {
                debug!("✗ InMemory GET {} -> 404", exact);
                Err(Error::http(404, r#"{"detail":"Not found."}"#))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_inmemory_respond_and_record() {
        let transport = InMemoryTransport::new();
        transport.respond("regions/", json!([]));

        let body = transport
            .get("regions/", &QueryParams::new())
            .await
            .expect("Failed to get");
        assert_eq!(body, json!([]));
        assert_eq!(transport.call_count("regions/"), 1);

        transport.reset_calls();
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_inmemory_exact_match_wins() {
        let transport = InMemoryTransport::new();
        let page2 = QueryParams::new().with("page", 2u32);
        transport.respond("menages/", json!({"count": 1}));
        transport.respond_to("menages/", &page2, json!({"count": 2}));

        let any = transport
            .get("menages/", &QueryParams::new().with("page", 1u32))
            .await
            .unwrap();
        let exact = transport.get("menages/", &page2).await.unwrap();

        assert_eq!(any["count"], 1);
        assert_eq!(exact["count"], 2);
    }

    #[tokio::test]
    async fn test_inmemory_unknown_path_is_404() {
        let transport = InMemoryTransport::new();
        let err = transport
            .get("nowhere/", &QueryParams::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_inmemory_gate_holds_until_released() {
        let transport = InMemoryTransport::new();
        transport.respond("stats/global/", json!({}));
        let gate = transport.hold("stats/global/");

        let t = transport.clone();
        let handle =
            tokio::spawn(async move { t.get("stats/global/", &QueryParams::new()).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        assert_eq!(transport.call_count("stats/global/"), 1);

        gate.release();
        let body = handle.await.expect("Task failed").expect("Failed to get");
        assert_eq!(body, json!({}));
    }
}
