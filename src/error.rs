// src/error.rs
// =============================================================================
// The error taxonomy of the dispatcher.
//
// Every class has a fixed blast radius:
// - FetchError / ParseError: abort one chain, never a worker or the process
// - StoreError: logged and counted by the relay, which keeps going
// - ConfigError: startup only, the one class allowed to end the process
// - SubmitError: returned to whoever handed us a seed
//
// Rust concepts:
// - thiserror: derives std::error::Error and Display from attributes
// - Enums with data: each variant carries the detail a log line needs
// =============================================================================

use thiserror::Error;

/// The page could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS, timeout or body-read failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered, but not with 2xx
    #[error("unexpected status {0}")]
    Status(u16),

    /// baseURL + reference did not form a valid URL
    #[error("invalid url '{0}'")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Status(status.as_u16()),
            None => FetchError::Transport(err.to_string()),
        }
    }
}

/// The page was retrieved but did not have the expected structure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("next-link list not found in page")]
    MissingStructure,

    #[error("next link has no title")]
    MissingLabel,

    #[error("next link has no href")]
    MissingReference,
}

/// A visited record could not be persisted.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("database write failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store already closed")]
    Closed,
}

/// Startup configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("invalid base url '{0}'")]
    InvalidBaseUrl(String),

    #[error("no usable storage target: {0}")]
    NoStorageTarget(String),
}

/// Why a seed or job was not accepted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("seed reference is empty")]
    EmptySeed,

    #[error("dispatcher is stopped")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_detail() {
        assert_eq!(FetchError::Status(404).to_string(), "unexpected status 404");
        let err = ConfigError::InvalidValue {
            name: "workers",
            reason: "must be at least 1".to_string(),
        };
        assert_eq!(err.to_string(), "invalid value for workers: must be at least 1");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
