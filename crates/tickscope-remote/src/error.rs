use thiserror::Error;

use tickscope_core::CoreError;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response; `body` holds at most the first 300 chars.
    #[error("HTTP {status} {method} {endpoint} {body}")]
    Api {
        status: u16,
        method: String,
        endpoint: String,
        body: String,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, RemoteError>;
