use std::path::PathBuf;

use rpgtl::{ConfigError, EventError};
use thiserror::Error;

/// Error types for the translation pipeline
#[derive(Debug, Error)]
pub enum MtError {
    /// Transport failure talking to the model endpoint (includes timeouts)
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint answered with a non-success status
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The endpoint answered, but not with a usable completion
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Bad or missing settings
    #[error("configuration error: {0}")]
    Config(String),

    /// A record or page does not have the shape its code requires
    #[error("structure error: {0}")]
    Structure(#[from] EventError),

    /// Any failure while handling one record, with the text being handled
    #[error("code {code} ({text:?}): {source}")]
    Record {
        code: i64,
        text: String,
        #[source]
        source: Box<MtError>,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A page worker panicked or was cancelled
    #[error("page task failed: {0}")]
    Task(String),

    /// File name that no traversal knows how to handle
    #[error("unsupported file: {0}")]
    UnsupportedFile(String),
}

impl MtError {
    /// Whether retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            MtError::Network(_) | MtError::MalformedResponse(_) => true,
            MtError::Api { status, .. } => *status == 429 || (500..600).contains(status),
            MtError::Record { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Attach the record being processed to an error
    pub fn in_record(self, code: i64, text: impl Into<String>) -> Self {
        match self {
            // keep the innermost record context
            err @ MtError::Record { .. } => err,
            err => MtError::Record {
                code,
                text: text.into(),
                source: Box::new(err),
            },
        }
    }
}

impl From<reqwest::Error> for MtError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            MtError::MalformedResponse(err.to_string())
        } else {
            MtError::Network(err.to_string())
        }
    }
}

impl From<ConfigError> for MtError {
    fn from(err: ConfigError) -> Self {
        MtError::Config(err.to_string())
    }
}

/// Result type for MT operations
pub type MtResult<T> = Result<T, MtError>;
