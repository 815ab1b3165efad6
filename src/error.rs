//! Error types for the survey monitor.

use std::fmt;

/// Result type for client, cache and view operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the survey monitor.
///
/// Errors are `Clone` because one failed request is shared by every
/// subscriber of the cache entry that issued it.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The request never produced an HTTP response.
    ///
    /// Common causes:
    /// - Connection refused or reset
    /// - DNS resolution failure
    /// - Configured request timeout elapsed
    Transport(String),

    /// The API answered with a non-2xx status.
    ///
    /// `body` is the raw response body. `detail` is set when the body is a
    /// JSON object carrying a `detail` string, which is how the API reports
    /// 404s and validation failures.
    Http {
        status: u16,
        body: String,
        detail: Option<String>,
    },

    /// A 2xx body could not be decoded into the expected shape.
    ///
    /// Page envelopes missing `results` are not reported here; they decode
    /// as empty pages.
    Decode(String),

    /// Invalid client or cache configuration.
    Config(String),

    /// A value was rejected before any request was made.
    ///
    /// Example: a household status code outside the known enumeration.
    Validation(String),

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    /// Build an HTTP error from a status and raw body, extracting `detail`.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string));
        Error::Http {
            status,
            body,
            detail,
        }
    }

    /// HTTP status, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The server's `detail` message, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Error::Http { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// True when no HTTP status is available.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Status as shown to users: the HTTP status, `FETCH_ERROR` when no
    /// response arrived, `PARSING_ERROR` for undecodable bodies.
    pub fn status_label(&self) -> Option<String> {
        match self {
            Error::Http { status, .. } => Some(status.to_string()),
            Error::Transport(_) => Some("FETCH_ERROR".to_string()),
            Error::Decode(_) => Some("PARSING_ERROR".to_string()),
            _ => None,
        }
    }

    /// One-line `"<status> <body>"` summary used in error panels.
    pub fn summary(&self) -> String {
        match self {
            Error::Http { status, body, .. } => format!("{} {}", status, body),
            Error::Transport(msg) | Error::Decode(msg) => {
                format!("{} {}", self.status_label().unwrap_or_default(), msg)
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(msg) => write!(f, "Transport error: {}", msg),
            Error::Http {
                status,
                detail: Some(detail),
                ..
            } => write!(f, "HTTP {}: {}", status, detail),
            Error::Http { status, body, .. } => write!(f, "HTTP {}: {}", status, body),
            Error::Decode(msg) => write!(f, "Decode error: {}", msg),
            Error::Config(msg) => write!(f, "Config error: {}", msg),
            Error::Validation(msg) => write!(f, "Validation error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::Transport(e.to_string())
        } else {
            Error::Decode(e.to_string())
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            Error::Config(e.to_string())
        } else if e.is_decode() {
            Error::Decode(e.to_string())
        } else {
            Error::Transport(e.to_string())
        }
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}
