//! Integration tests for the reqwest transport
//!
//! Each test starts a small axum server on an ephemeral local port and
//! points the client at it.

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use survey_monitor::client::{ApiClient, HttpTransport};
use survey_monitor::config::ClientConfig;
use survey_monitor::models::{HouseholdListArgs, HouseholdStatus};
use survey_monitor::{Error, QueryParams, Transport};

async fn echo(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!(params))
}

async fn households(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let page = params.get("page").cloned().unwrap_or_default();
    Json(json!({
        "count": 1,
        "results": [{
            "idmng": format!("MNG-page-{}", page),
            "region_nom": "DAKAR",
            "statut_menage_display": "COMPLET",
            "date_enquete": "2024-03-07T10:15:00Z"
        }]
    }))
}

async fn missing_household(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"detail": format!("Ménage {} introuvable.", id)})),
    )
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(500)).await;
    Json(json!({}))
}

fn router() -> Router {
    Router::new()
        .route("/api/echo/", get(echo))
        .route("/api/menages/", get(households))
        .route("/api/menages/{id}/", get(missing_household))
        .route("/api/empty/", get(|| async { "" }))
        .route("/api/broken/", get(|| async { "{not json" }))
        .route("/api/slow/", get(slow))
}

async fn serve() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, router()).await.expect("Server failed");
    });
    format!("http://{}/api/", addr)
}

async fn transport() -> HttpTransport {
    let config = ClientConfig::default().with_base_url(serve().await);
    HttpTransport::new(config).expect("Failed to build transport")
}

/// Test 1: Parameters are sent as a query string, empty ones dropped
#[tokio::test]
async fn test_query_string() {
    let transport = transport().await;
    let params = HouseholdListArgs::new(2, 25)
        .with_region("")
        .with_status(HouseholdStatus::Refusal)
        .to_params();

    let body = transport.get("echo/", &params).await.expect("GET failed");

    assert_eq!(
        body,
        json!({"page": "2", "page_size": "25", "statut_menage": "9"})
    );
}

/// Test 2: A paginated list decodes through the typed client
#[tokio::test]
async fn test_households_page() {
    let client = ApiClient::new(transport().await);

    let page = client
        .households(&HouseholdListArgs::new(3, 10))
        .await
        .expect("Request failed");

    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].id, "MNG-page-3");
    assert_eq!(
        page.results[0].survey_date.map(|d| d.to_string()).as_deref(),
        Some("2024-03-07")
    );
}

/// Test 3: Non-2xx responses keep their status and body
#[tokio::test]
async fn test_http_error_detail() {
    let client = ApiClient::new(transport().await);

    let err = client.household("MNG9").await.expect_err("Expected a 404");

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.detail(), Some("Ménage MNG9 introuvable."));
}

/// Test 4: An empty body is JSON null
#[tokio::test]
async fn test_empty_body_is_null() {
    let transport = transport().await;

    let body = transport
        .get("empty/", &QueryParams::new())
        .await
        .expect("GET failed");

    assert_eq!(body, Value::Null);
}

/// Test 5: An unparsable body is a decode error
#[tokio::test]
async fn test_unparsable_body() {
    let transport = transport().await;

    let err = transport
        .get("broken/", &QueryParams::new())
        .await
        .expect_err("Expected a decode error");

    assert!(matches!(err, Error::Decode(_)));
    assert_eq!(err.status_label().as_deref(), Some("PARSING_ERROR"));
}

/// Test 6: Connection failures are transport errors
#[tokio::test]
async fn test_connection_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local address");
    drop(listener);

    let config = ClientConfig::default().with_base_url(format!("http://{}/api/", addr));
    let transport = HttpTransport::new(config).expect("Failed to build transport");

    let err = transport
        .get("regions/", &QueryParams::new())
        .await
        .expect_err("Expected a transport error");

    assert!(err.is_transport());
    assert_eq!(err.status(), None);
}

/// Test 7: The configured timeout applies to every request
#[tokio::test]
async fn test_timeout() {
    let config = ClientConfig::default()
        .with_base_url(serve().await)
        .with_timeout(Duration::from_millis(50));
    let transport = HttpTransport::new(config).expect("Failed to build transport");

    let err = transport
        .get("slow/", &QueryParams::new())
        .await
        .expect_err("Expected a timeout");

    assert!(err.is_transport());
}
