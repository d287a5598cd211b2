//! One-stop client wiring.
//!
//! [`ChatClient`] shares a single [`AuthSession`] between the REST client
//! and the stream controller, and routes sends through a
//! [`ConversationReconciler`].

use chatstream_client::{
    ApiClient, AuthSession, ClientConfig, ClientResult, HttpChatStream,
};
use chatstream_conversation::{ConversationReconciler, ConversationResult, SendOutcome};
use chatstream_core::{title_sample, Message, Thread, ThreadId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Reconciler type used by [`ChatClient`].
pub type Conversation = ConversationReconciler<HttpChatStream, Arc<ApiClient>>;

/// A logged-in (or logging-in) chat user.
#[derive(Debug)]
pub struct ChatClient {
    session: Arc<AuthSession>,
    api: Arc<ApiClient>,
    conversation: Conversation,
}

impl ChatClient {
    /// Build a client from configuration.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let session = Arc::new(AuthSession::new());
        let api = Arc::new(ApiClient::new(config.clone(), session.clone())?);
        let stream = HttpChatStream::new(config, session.clone())?;
        Ok(Self {
            session,
            api: api.clone(),
            conversation: ConversationReconciler::new(stream, api),
        })
    }

    /// Build a client from `{prefix}_*` environment variables.
    pub fn from_env(prefix: &str) -> ClientResult<Self> {
        Self::new(ClientConfig::from_env(prefix)?)
    }

    /// The shared auth session.
    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// The REST client.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// The per-thread reconciler.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Fetch a thread's messages from the server and make them current.
    pub async fn open_thread(&self, thread_id: &ThreadId) -> ClientResult<Vec<Message>> {
        let messages = self.api.list_messages(thread_id).await?;
        self.conversation.load(thread_id.clone(), messages.clone());
        Ok(messages)
    }

    /// Send a message on a thread and stream the reply.
    pub async fn send(
        &self,
        thread_id: &ThreadId,
        content: &str,
        on_delta: impl FnMut(&str) + Send,
    ) -> ConversationResult<SendOutcome> {
        self.conversation
            .send(thread_id.clone(), content, on_delta)
            .await
    }

    /// Cancel the reply streaming into a thread.
    pub fn cancel(&self, thread_id: &ThreadId) -> bool {
        self.conversation.cancel(thread_id)
    }

    /// Give a placeholder-titled thread a generated title.
    ///
    /// Returns the renamed thread, or `None` when the thread already has a
    /// title or there is no user text to summarise.
    pub async fn auto_title(&self, thread: &Thread) -> ClientResult<Option<Thread>> {
        if !thread.needs_auto_title() {
            return Ok(None);
        }

        let sample = title_sample(&self.conversation.messages(&thread.id));
        if sample.trim().is_empty() {
            return Ok(None);
        }

        let title = self.api.generate_title(&sample).await?;
        if title.is_empty() {
            warn!(thread_id = %thread.id, "Title generator returned an empty title");
            return Ok(None);
        }

        self.api.rename_thread(&thread.id, &title).await?;
        debug!(thread_id = %thread.id, title = %title, "Thread auto-titled");
        Ok(Some(Thread::new(thread.id.clone(), title)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> ChatClient {
        ChatClient::new(ClientConfig::new(server.uri()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_login_then_send_uses_shared_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "jwt"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("authorization", "Bearer jwt"))
            .respond_with(ResponseTemplate::new(201))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(header("authorization", "Bearer jwt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("data: {\"type\":\"delta\",\"value\":\"Hi!\"}\n\ndata: [DONE]\n\n"),
            )
            .mount(&server)
            .await;

        let chat = client(&server).await;
        chat.api().login("a@b.c", "pw").await.unwrap();

        let thread = ThreadId::from("t1");
        let mut streamed = String::new();
        let outcome = chat
            .send(&thread, "hello", |d: &str| streamed.push_str(d))
            .await
            .unwrap();

        assert_eq!(outcome, SendOutcome::Completed { text: "Hi!".into() });
        assert_eq!(streamed, "Hi!");
        assert_eq!(
            chat.conversation().messages(&thread),
            vec![Message::user("hello"), Message::assistant("Hi!")]
        );
    }

    #[tokio::test]
    async fn test_open_thread_then_auto_title() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages"))
            .and(query_param("threadId", "t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rows": [
                    {"role": "user", "content": "plan a trip to Lisbon"},
                    {"role": "assistant", "content": "Sure."}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/utils/generate-title"))
            .and(body_json(json!({"text": "plan a trip to Lisbon"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": " Lisbon trip "})))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/threads/t1"))
            .and(body_json(json!({"title": "Lisbon trip"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let chat = client(&server).await;
        let thread = Thread::new("t1", "New chat");

        let messages = chat.open_thread(&thread.id).await.unwrap();
        assert_eq!(messages.len(), 2);

        let renamed = chat.auto_title(&thread).await.unwrap();
        assert_eq!(renamed, Some(Thread::new("t1", "Lisbon trip")));
    }

    #[tokio::test]
    async fn test_titled_thread_is_left_alone() {
        let server = MockServer::start().await;
        let chat = client(&server).await;

        let renamed = chat.auto_title(&Thread::new("t1", "Groceries")).await.unwrap();

        assert_eq!(renamed, None);
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}
