//! Error types.
//!
//! Messages are stored as strings so the errors are `Clone` and can be kept
//! inside a cached policy and reported on every evaluation that hits them.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to build a policy from pattern files. Always evaluated as deny.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("pattern file not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("cannot read {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("malformed pattern file {source_name}: {message}")]
    Schema { source_name: String, message: String },

    #[error("invalid regex in {source_name} rule #{index} ({pattern}): {message}")]
    InvalidPattern {
        source_name: String,
        index: usize,
        pattern: String,
        message: String,
    },

    #[error("{source_name} rule #{index} ({pattern}) has an empty reason")]
    EmptyReason {
        source_name: String,
        index: usize,
        pattern: String,
    },

    #[error("invalid path template in {source_name} ({template}): {message}")]
    InvalidTemplate {
        source_name: String,
        template: String,
        message: String,
    },
}

/// Failure while merging or reading settings documents.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("{what} is not a JSON object")]
    NotAnObject { what: String },

    #[error("cannot parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
