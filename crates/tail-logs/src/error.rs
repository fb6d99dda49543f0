//! Error types for the log engine.

use thiserror::Error;

/// Errors that can occur in the log engine.
#[derive(Debug, Error)]
pub enum LogError {
    /// The line was not valid JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The line was valid JSON but not an object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// A search pattern failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for log engine operations.
pub type Result<T> = std::result::Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = LogError::NotAnObject("array");
        assert_eq!(err.to_string(), "expected a JSON object, got array");

        let err = LogError::InvalidPattern("unclosed character class".to_string());
        assert_eq!(err.to_string(), "invalid pattern: unclosed character class");
    }

    #[test]
    fn error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let err: LogError = serde_err.into();
        assert!(matches!(err, LogError::Serialization(_)));
        assert!(err.to_string().starts_with("serialization error"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LogError>();
    }
}
