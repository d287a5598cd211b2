//! Message persistence collaborator.

use crate::api::ApiClient;
use crate::error::ClientResult;
use async_trait::async_trait;
use chatstream_core::{Role, ThreadId};
use std::sync::Arc;

/// Persists conversation turns.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a user turn. A failure aborts the send before streaming starts.
    async fn send_user_message(&self, thread_id: &ThreadId, content: &str) -> ClientResult<()>;

    /// Persist a finished assistant reply. Called once per completed stream.
    async fn persist_assistant_message(
        &self,
        thread_id: &ThreadId,
        content: &str,
    ) -> ClientResult<()>;
}

#[async_trait]
impl MessageStore for ApiClient {
    async fn send_user_message(&self, thread_id: &ThreadId, content: &str) -> ClientResult<()> {
        self.post_message(thread_id, Role::User, content).await
    }

    async fn persist_assistant_message(
        &self,
        thread_id: &ThreadId,
        content: &str,
    ) -> ClientResult<()> {
        self.post_message(thread_id, Role::Assistant, content).await
    }
}

#[async_trait]
impl<T: MessageStore + ?Sized> MessageStore for Arc<T> {
    async fn send_user_message(&self, thread_id: &ThreadId, content: &str) -> ClientResult<()> {
        (**self).send_user_message(thread_id, content).await
    }

    async fn persist_assistant_message(
        &self,
        thread_id: &ThreadId,
        content: &str,
    ) -> ClientResult<()> {
        (**self).persist_assistant_message(thread_id, content).await
    }
}
