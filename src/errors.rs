use std::time::Duration;
use thiserror::Error;

/// Errors recorded on a `QueryBuilder` during a chain and surfaced by `build()`/`aggregate()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Invalid identifier {value:?}: {reason}")]
    InvalidIdentifier { value: String, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Failures reported by a `Store` collaborator. Passed through to repository callers verbatim.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("BSON: {0}")]
    Bson(#[from] bson::error::Error),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    #[error("Cursor closed")]
    CursorClosed,

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Errors returned by `Repository` operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Query compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<bson::error::Error> for RepoError {
    fn from(e: bson::error::Error) -> Self {
        Self::Store(StoreError::Bson(e))
    }
}

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: String, reason: String },
}
