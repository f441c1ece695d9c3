// MIT License - Copyright (c) 2025 olarm2mqtt contributors

/// All errors that can occur in the olarm2mqtt library.
#[derive(Debug, thiserror::Error)]
pub enum OlarmError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Olarm API rejected the request: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Authentication failed (HTTP {status}); access token expired or revoked?")]
    Auth { status: u16 },

    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid {kind} index: {index} (device has {max})")]
    InvalidIndex {
        kind: &'static str,
        index: usize,
        max: usize,
    },

    #[error("Unknown LINK module id: {0}")]
    UnknownLink(String),
}

impl OlarmError {
    /// Whether this error is transient and the operation should be retried.
    ///
    /// Auth failures and malformed payloads are permanent; transport hiccups
    /// and server-side (5xx) responses are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            OlarmError::Http(_) | OlarmError::Mqtt(_) => true,
            OlarmError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, OlarmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_retryable() {
        let server = OlarmError::Api {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert!(server.is_retryable());

        let throttled = OlarmError::Api {
            status: 429,
            body: "slow down".to_string(),
        };
        assert!(throttled.is_retryable());

        let bad_request = OlarmError::Api {
            status: 400,
            body: "bad actionCmd".to_string(),
        };
        assert!(!bad_request.is_retryable());
    }

    #[test]
    fn test_auth_error_not_retryable() {
        let err = OlarmError::Auth { status: 401 };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_invalid_index_display() {
        let err = OlarmError::InvalidIndex {
            kind: "area",
            index: 9,
            max: 2,
        };
        assert_eq!(err.to_string(), "Invalid area index: 9 (device has 2)");
    }
}
