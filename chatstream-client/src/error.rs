//! Client error types.

use chatstream_streaming::StreamError;
use thiserror::Error;

/// Errors surfaced by the chat client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the credentials (401/403). Callers should send
    /// the user back to a login flow.
    #[error("Authentication required ({status}): {message}")]
    Authentication {
        /// HTTP status code.
        status: u16,
        /// Server message.
        message: String,
    },

    /// The endpoint does not exist (404). Advances to the next candidate.
    #[error("Endpoint not found: {path}")]
    NotFound {
        /// Path that returned not-found.
        path: String,
    },

    /// Every candidate endpoint returned not-found.
    #[error("All endpoints exhausted ({}): {last}", .tried.join(", "))]
    EndpointsExhausted {
        /// Paths tried, in order.
        tried: Vec<String>,
        /// The last not-found error.
        last: Box<ClientError>,
    },

    /// Non-success status other than auth and not-found.
    #[error("Server rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server message, or `HTTP <status>`.
        message: String,
    },

    /// The stream carried an error event.
    #[error("Server error: {0}")]
    Api(String),

    /// Connection could not be established or was dropped.
    #[error("Network error: {0}")]
    Network(String),

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Decoding the streamed body failed.
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    /// Classify a non-success response.
    ///
    /// `body` is the raw response body; its JSON `error`/`message` field is
    /// used as the message when present.
    pub fn from_status(status: u16, body: &str, path: &str) -> Self {
        match status {
            401 | 403 => Self::Authentication {
                status,
                message: error_message(status, body),
            },
            404 => Self::NotFound {
                path: path.to_string(),
            },
            _ => Self::Rejected {
                status,
                message: error_message(status, body),
            },
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Whether the caller should re-authenticate.
    #[must_use]
    pub fn is_auth_required(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Whether this is a not-found that should advance to the next candidate.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the connection failed rather than the server answering.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout | Self::Stream(StreamError::Transport(_))
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() || err.is_request() || err.is_body() {
            ClientError::Network(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::Rejected {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ClientError::Other(err.into())
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Extract a human-readable message from an error body.
///
/// Looks at the JSON `error` then `message` fields (including a nested
/// `error.message`), falling back to `HTTP <status>`.
#[must_use]
pub fn error_message(status: u16, body: &str) -> String {
    let fallback = || format!("HTTP {status}");

    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return fallback();
    };

    let field = |v: &serde_json::Value, key: &str| {
        v.get(key)
            .and_then(|f| f.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    field(&json, "error")
        .or_else(|| json.get("error").and_then(|e| field(e, "message")))
        .or_else(|| field(&json, "message"))
        .unwrap_or_else(fallback)
}
