//! Stream session controller.
//!
//! Drives one streaming attempt end to end: connect to the first candidate
//! endpoint that exists, decode the body into frames, classify each frame,
//! and hand text deltas to the caller.
//!
//! ```text
//! Idle -> Connecting(endpoint) -> Reading -> Completed | Failed | Cancelled
//!              ^        |
//!              +--------+  not found: next candidate
//! ```
//!
//! Cancellation is cooperative. The token is checked wherever the session
//! waits on the network (response headers, an error body, the next frame),
//! so once it is observed no further delta is delivered.

use crate::auth::HeaderSource;
use crate::config::{ClientConfig, RequestShape};
use crate::endpoint::EndpointCandidates;
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use chatstream_core::{Message, SessionId, ThreadId};
use chatstream_streaming::{interpret, FrameDecoder, FrameStream, StreamEvent};
use futures::StreamExt;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// What to send when opening a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    /// Thread the reply belongs to.
    pub thread_id: ThreadId,
    /// The new user message.
    pub content: String,
    /// Conversation so far, including the new user message.
    pub history: Vec<Message>,
}

impl StreamRequest {
    /// Create a request carrying only the new message.
    #[must_use]
    pub fn new(thread_id: impl Into<ThreadId>, content: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            content: content.into(),
            history: Vec::new(),
        }
    }

    /// Attach the message history.
    #[must_use]
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// JSON body in the given shape.
    #[must_use]
    pub fn body(&self, shape: RequestShape) -> Value {
        match shape {
            RequestShape::Message => json!({
                "threadId": self.thread_id,
                "content": self.content,
            }),
            RequestShape::History => {
                let messages = if self.history.is_empty() {
                    vec![Message::user(self.content.clone())]
                } else {
                    self.history.clone()
                };
                json!({
                    "threadId": self.thread_id,
                    "messages": messages,
                })
            }
        }
    }
}

/// State of a stream session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    /// Created, nothing sent yet.
    Idle,
    /// Waiting for response headers from a candidate.
    Connecting {
        /// Path being tried.
        endpoint: String,
    },
    /// Consuming the response body.
    Reading,
    /// The server finished the reply.
    Completed,
    /// The attempt failed.
    Failed,
    /// The caller cancelled.
    Cancelled,
}

impl StreamState {
    /// Whether the session has ended.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Failed | StreamState::Cancelled
        )
    }
}

/// How a stream that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The reply finished normally.
    Completed {
        /// Path that served the stream.
        endpoint: String,
        /// Full reply text.
        text: String,
    },
    /// The caller cancelled; `text` is whatever arrived first.
    Cancelled {
        /// Partial reply text.
        text: String,
    },
}

impl StreamOutcome {
    /// Text delivered during the session.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            StreamOutcome::Completed { text, .. } | StreamOutcome::Cancelled { text } => text,
        }
    }

    /// Whether the session was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamOutcome::Cancelled { .. })
    }
}

/// One streaming attempt.
#[derive(Debug)]
pub struct StreamSession {
    id: SessionId,
    thread_id: ThreadId,
    endpoint: Option<String>,
    state: StreamState,
    text: String,
}

impl StreamSession {
    /// Start a session for a thread.
    #[must_use]
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            id: SessionId::new(),
            thread_id,
            endpoint: None,
            state: StreamState::Idle,
            text: String::new(),
        }
    }

    /// Session id used in logs.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Endpoint that served the stream, once connected.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Text accumulated so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    fn transition(&mut self, state: StreamState) {
        debug!(
            session = %self.id,
            thread_id = %self.thread_id,
            from = ?self.state,
            to = ?state,
            "Stream state transition"
        );
        self.state = state;
    }

    fn connecting(&mut self, endpoint: &str) {
        self.endpoint = Some(endpoint.to_string());
        self.transition(StreamState::Connecting {
            endpoint: endpoint.to_string(),
        });
    }

    fn push_delta(&mut self, delta: &str) {
        self.text.push_str(delta);
    }

    fn cancelled(mut self) -> StreamOutcome {
        self.transition(StreamState::Cancelled);
        StreamOutcome::Cancelled { text: self.text }
    }

    fn completed(mut self) -> StreamOutcome {
        self.transition(StreamState::Completed);
        StreamOutcome::Completed {
            endpoint: self.endpoint.unwrap_or_default(),
            text: self.text,
        }
    }

    fn failed(&mut self, error: ClientError) -> ClientError {
        warn!(session = %self.id, thread_id = %self.thread_id, error = %error, "Stream failed");
        self.transition(StreamState::Failed);
        error
    }
}

/// Source of streamed replies.
#[async_trait]
pub trait ChatStream: Send + Sync {
    /// Stream the reply to `request`, calling `on_delta` for each text delta.
    ///
    /// Deltas are delivered in arrival order, one at a time. Returns
    /// [`StreamOutcome::Cancelled`] rather than an error when `cancel` fires.
    async fn start_stream(
        &self,
        request: &StreamRequest,
        on_delta: &mut (dyn for<'d> FnMut(&'d str) + Send),
        cancel: &CancellationToken,
    ) -> ClientResult<StreamOutcome>;
}

#[async_trait]
impl<T: ChatStream + ?Sized> ChatStream for Arc<T> {
    async fn start_stream(
        &self,
        request: &StreamRequest,
        on_delta: &mut (dyn for<'d> FnMut(&'d str) + Send),
        cancel: &CancellationToken,
    ) -> ClientResult<StreamOutcome> {
        (**self).start_stream(request, on_delta, cancel).await
    }
}

enum Connection {
    Open { endpoint: String, response: Response },
    Cancelled,
}

/// [`ChatStream`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpChatStream {
    http: Client,
    config: Arc<ClientConfig>,
    headers: Arc<dyn HeaderSource>,
}

impl HttpChatStream {
    /// Create a controller using `headers` for auth.
    pub fn new(config: ClientConfig, headers: Arc<dyn HeaderSource>) -> ClientResult<Self> {
        let http = config.build_client()?;
        Ok(Self {
            http,
            config: Arc::new(config),
            headers,
        })
    }

    /// Create a controller with an existing reqwest client.
    pub fn with_http_client(
        http: Client,
        config: ClientConfig,
        headers: Arc<dyn HeaderSource>,
    ) -> Self {
        Self {
            http,
            config: Arc::new(config),
            headers,
        }
    }

    async fn connect(
        &self,
        endpoint: String,
        body: &Value,
        session_id: &SessionId,
        cancel: &CancellationToken,
    ) -> ClientResult<Connection> {
        trace!(session = %session_id, endpoint = %endpoint, "Connecting");

        let request = self
            .http
            .post(self.config.url(&endpoint))
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .headers(self.headers.auth_headers())
            .json(body);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(Connection::Cancelled),
            response = request.send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let text = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Connection::Cancelled),
                text = response.text() => text.unwrap_or_default(),
            };
            return Err(ClientError::from_status(status.as_u16(), &text, &endpoint));
        }

        debug!(session = %session_id, endpoint = %endpoint, status = status.as_u16(), "Stream opened");
        Ok(Connection::Open { endpoint, response })
    }
}

#[async_trait]
impl ChatStream for HttpChatStream {
    async fn start_stream(
        &self,
        request: &StreamRequest,
        on_delta: &mut (dyn for<'d> FnMut(&'d str) + Send),
        cancel: &CancellationToken,
    ) -> ClientResult<StreamOutcome> {
        let mut session = StreamSession::new(request.thread_id.clone());
        let candidates = EndpointCandidates::new(self.config.stream_paths.iter().cloned());
        let body = request.body(self.config.request_shape);
        let session_id = session.id().clone();
        let (body, session_id) = (&body, &session_id);
        let tracker = &mut session;

        let connection = candidates
            .try_in_order(move |endpoint| {
                tracker.connecting(&endpoint);
                self.connect(endpoint, body, session_id, cancel)
            })
            .await;

        let (endpoint, response) = match connection {
            Ok(Connection::Open { endpoint, response }) => (endpoint, response),
            Ok(Connection::Cancelled) => return Ok(session.cancelled()),
            Err(error) => return Err(session.failed(error)),
        };

        session.endpoint = Some(endpoint);
        session.transition(StreamState::Reading);

        let decoder =
            FrameDecoder::new(self.config.separator).with_max_buffer(self.config.max_frame_size);
        let mut frames = std::pin::pin!(FrameStream::with_decoder(response.bytes_stream(), decoder));

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(session.cancelled()),
                next = frames.next() => next,
            };

            let frame = match next {
                None => return Ok(session.completed()),
                Some(Ok(frame)) => frame,
                Some(Err(error)) => return Err(session.failed(error.into())),
            };

            match interpret(&frame) {
                None => trace!(session = %session.id, "Frame carried no event"),
                Some(StreamEvent::Terminal) => return Ok(session.completed()),
                Some(StreamEvent::Failure(message)) => {
                    return Err(session.failed(ClientError::Api(message)))
                }
                Some(event) => {
                    if let Some(delta) = event.delta_text() {
                        session.push_delta(delta);
                        on_delta(delta);
                    }
                }
            }
        }
    }
}
