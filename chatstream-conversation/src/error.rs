//! Conversation error types.

use chatstream_client::ClientError;
use thiserror::Error;

/// Errors from sending a message in a conversation.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// The message was blank.
    #[error("Message is empty")]
    EmptyMessage,

    /// The user turn could not be stored. No stream was opened.
    #[error("Failed to send user message: {0}")]
    UserMessage(#[source] ClientError),

    /// The reply stream failed.
    #[error("Reply stream failed: {0}")]
    Stream(#[source] ClientError),

    /// The reply finished but could not be stored.
    #[error("Failed to persist assistant message: {0}")]
    Persist(#[source] ClientError),
}

impl ConversationError {
    /// The underlying client error, if any.
    #[must_use]
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            Self::EmptyMessage => None,
            Self::UserMessage(e) | Self::Stream(e) | Self::Persist(e) => Some(e),
        }
    }

    /// Whether the caller should send the user back to login.
    #[must_use]
    pub fn is_auth_required(&self) -> bool {
        self.client_error().is_some_and(ClientError::is_auth_required)
    }
}

/// Result type for conversation operations.
pub type ConversationResult<T> = Result<T, ConversationError>;
