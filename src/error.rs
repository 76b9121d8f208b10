//! Error types for lmstudio-terminal
//!
//! Every variant is `Clone` so the same failure can be broadcast to event
//! subscribers and returned to the caller.

use thiserror::Error;

/// Result type alias using [`LmStudioError`]
pub type Result<T> = std::result::Result<T, LmStudioError>;

/// Main error type for lmstudio-terminal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LmStudioError {
    /// Listing succeeded but the server has no models loaded
    #[error("No models available in LM Studio at {endpoint}")]
    NoModelsAvailable { endpoint: String },

    /// Completion requested before a successful connect
    #[error("Not connected to LM Studio")]
    NotConnected,

    /// Transport-level failure (connection refused, DNS, TLS, ...)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Server answered with a non-success status or an unusable body
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(String),

    /// Failure while consuming a streaming response
    #[error("Stream error: {0}")]
    Stream(String),

    /// Client used after `disconnect`
    #[error("Client connection has been closed")]
    ClientClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for LmStudioError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LmStudioError::Json(err.to_string())
        } else {
            LmStudioError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LmStudioError {
    fn from(err: serde_json::Error) -> Self {
        LmStudioError::Json(err.to_string())
    }
}

impl From<std::io::Error> for LmStudioError {
    fn from(err: std::io::Error) -> Self {
        LmStudioError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = LmStudioError::NoModelsAvailable {
            endpoint: "ws://localhost:1234".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No models available in LM Studio at ws://localhost:1234"
        );
        assert_eq!(
            LmStudioError::NotConnected.to_string(),
            "Not connected to LM Studio"
        );
        let api = LmStudioError::Api {
            status: 503,
            message: "model loading".to_string(),
        };
        assert_eq!(api.to_string(), "API error (503): model loading");
    }

    #[test]
    fn test_json_error_conversion() {
        let err: LmStudioError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, LmStudioError::Json(_)));
    }
}
