//! Timeline engine error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by the transport for a single request.
///
/// `status` is `None` when the request never produced an HTTP response
/// (DNS, connect, TLS or body-decode failures).
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("HTTP request failed (status: {status:?}): {data}")]
pub struct HttpError {
    pub status: Option<u16>,
    pub data: serde_json::Value,
}

impl HttpError {
    pub fn new(status: u16, data: impl Into<serde_json::Value>) -> Self {
        Self {
            status: Some(status),
            data: data.into(),
        }
    }

    /// Network-level failure without an HTTP status
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            data: serde_json::Value::String(message.into()),
        }
    }

    /// Server supplied `{"error": "..."}` message, if any
    pub fn server_message(&self) -> Option<&str> {
        self.data.get("error").and_then(|v| v.as_str())
    }
}

/// Errors surfaced by the timeline engine.
///
/// `Clone` so every waiter attached to a single in-flight fetch receives the
/// same error value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    /// A feed key lacks a parameter its kind requires
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network or HTTP failure from the transport
    #[error("Transport error: {0}")]
    Transport(#[from] HttpError),

    /// A remote status could not be mapped to a local id
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// The server response violated an expected invariant
    #[error("Consistency error: {0}")]
    Consistency(String),
}

impl TimelineError {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            TimelineError::Configuration(_) => "configuration",
            TimelineError::Transport(_) => "transport",
            TimelineError::Resolution(_) => "resolution",
            TimelineError::Consistency(_) => "consistency",
        }
    }
}

impl From<serde_json::Error> for TimelineError {
    fn from(err: serde_json::Error) -> Self {
        TimelineError::Consistency(format!("unexpected response shape: {}", err))
    }
}

pub type TimelineResult<T> = Result<T, TimelineError>;
