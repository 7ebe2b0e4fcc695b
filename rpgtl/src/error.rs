//! Error types for the core crate.

use std::path::PathBuf;

use thiserror::Error;

/// A record or page that does not have the shape its code requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("page is not a JSON list")]
    NotAList,

    #[error("record has neither `code` nor `c` key")]
    UnknownSchema,

    #[error("code {code}: missing parameter {index}")]
    MissingParameter { code: i64, index: usize },

    #[error("code {code}: parameter {index} is not a {expected}")]
    WrongType {
        code: i64,
        index: usize,
        expected: &'static str,
    },
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
