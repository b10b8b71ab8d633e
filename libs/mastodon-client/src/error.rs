//! Client construction errors
//!
//! Request failures never surface as [`ClientError`]; the transport maps
//! them into `timeline_sync::HttpError` so the engine can roll back.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;
