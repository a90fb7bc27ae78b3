use std::path::PathBuf;
use thiserror::Error;

/// Failures from a chat completion call
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No API key provided. Please set your API key.")]
    MissingApiKey,

    #[error("API request failed: {0}")]
    Transport(String),

    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to encode request: {0}")]
    Encode(String),

    #[error("Failed to decode API response: {0}")]
    Decode(String),

    #[error("API response contained no choices")]
    EmptyResponse,

    #[error("Request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Failures reading or writing saved conversations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to create save directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Conversation file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid conversation file {path:?}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
