//! Error types for the habit tracker

use habit_store_client::StoreError;
use thiserror::Error;

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Backend code for a rejected or mismatched schema
pub const SCHEMA_MISMATCH_CODE: &str = "PGRST301";

/// Tracker error types
#[derive(Error, Debug)]
pub enum TrackerError {
    /// No signed-in user
    #[error("Not authenticated")]
    Unauthenticated,

    /// Remote store rejected or failed the request
    #[error("Remote error: {message}")]
    Remote {
        code: Option<String>,
        message: String,
    },

    /// Month key is not "YYYY-MM"
    #[error("Invalid month key: {0}")]
    InvalidMonth(String),

    /// Local cache could not be read or written
    #[error("Cache error: {0}")]
    Cache(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TrackerError {
    /// Build a remote error from a message alone
    pub fn remote(message: impl Into<String>) -> Self {
        TrackerError::Remote {
            code: None,
            message: message.into(),
        }
    }

    /// Whether the backend is running against a stale schema.
    ///
    /// Detected from the error code, or from the backend naming a missing
    /// column in its message.
    pub fn is_schema_mismatch(&self) -> bool {
        match self {
            TrackerError::Remote { code, message } => {
                code.as_deref() == Some(SCHEMA_MISMATCH_CODE) || message.contains("column")
            }
            _ => false,
        }
    }
}

impl From<StoreError> for TrackerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unauthorized => TrackerError::Unauthenticated,
            StoreError::Api { code, message, .. } => TrackerError::Remote { code, message },
            other => TrackerError::Remote {
                code: None,
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for TrackerError {
    fn from(err: std::io::Error) -> Self {
        TrackerError::Cache(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_by_code() {
        let err = TrackerError::Remote {
            code: Some("PGRST301".into()),
            message: "JWT expired".into(),
        };
        assert!(err.is_schema_mismatch());
    }

    #[test]
    fn test_schema_mismatch_by_message() {
        let err = TrackerError::remote("column habit_logs.month does not exist");
        assert!(err.is_schema_mismatch());
    }

    #[test]
    fn test_generic_failure_is_not_schema_mismatch() {
        assert!(!TrackerError::remote("connection reset").is_schema_mismatch());
        assert!(!TrackerError::Unauthenticated.is_schema_mismatch());
    }

    #[test]
    fn test_from_store_error() {
        let err: TrackerError = StoreError::Api {
            status: 400,
            code: Some("42703".into()),
            message: "column x does not exist".into(),
        }
        .into();
        assert!(matches!(err, TrackerError::Remote { .. }));
        assert!(err.is_schema_mismatch());

        let err: TrackerError = StoreError::Unauthorized.into();
        assert!(matches!(err, TrackerError::Unauthenticated));
    }
}
