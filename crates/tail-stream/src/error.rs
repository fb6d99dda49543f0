//! Error types for the stream server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for stream server operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur in the stream server.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(std::net::SocketAddr, std::io::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// WebSocket error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Too many connections.
    #[error("too many connections: {0} active, limit is {1}")]
    TooManyConnections(usize, usize),

    /// Channel send error.
    #[error("channel send failed: {0}")]
    ChannelSend(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Self::TooManyConnections(_, _) => {
                (StatusCode::SERVICE_UNAVAILABLE, "too_many_connections")
            }
            Self::BindFailed(_, _)
            | Self::Internal(_)
            | Self::WebSocket(_)
            | Self::Serialization(_)
            | Self::ChannelSend(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"error":"internal_error","message":"failed to serialize error"}"#.to_string()
        });

        (status, [("content-type", "application/json")], json).into_response()
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<axum::Error> for StreamError {
    fn from(err: axum::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_too_many_connections_error_response() {
        let err = StreamError::TooManyConnections(100, 50);
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["error"], "too_many_connections");
        assert!(json["message"].as_str().unwrap().contains("limit is 50"));
    }

    #[tokio::test]
    async fn test_internal_error_response() {
        let err = StreamError::Internal("something broke".to_string());
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_from_serde_error() {
        let serde_err = serde_json::from_str::<i32>("invalid").unwrap_err();
        let err = StreamError::from(serde_err);

        assert!(matches!(err, StreamError::Serialization(_)));
    }

    #[test]
    fn test_from_socket_error() {
        let err: StreamError = axum::Error::new(std::io::Error::other("connection reset")).into();
        assert!(matches!(&err, StreamError::WebSocket(msg) if msg.contains("connection reset")));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_display() {
        let err = StreamError::ChannelSend("client queue full".to_string());
        assert_eq!(err.to_string(), "channel send failed: client queue full");

        let err = StreamError::WebSocket("connection reset".to_string());
        assert_eq!(err.to_string(), "websocket error: connection reset");
    }
}
