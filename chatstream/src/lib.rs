//! # chatstream
//!
//! A streaming chat client. Replies arrive as incremental text over a
//! long-lived HTTP response; chatstream decodes them frame by frame, falls
//! back across alternative endpoint paths, and keeps each thread's message
//! list consistent while a reply is streaming.
//!
//! ## Quick Start
//!
//! ```ignore
//! use chatstream::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let chat = ChatClient::new(ClientConfig::new("http://localhost:3000")?)?;
//!     chat.api().login("me@example.com", "secret").await?;
//!
//!     let thread = chat.api().create_thread(None).await?;
//!     chat.send(&thread.id, "Hello!", |delta: &str| print!("{delta}")).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`chatstream_core`] - Messages, threads and identifiers
//! - [`chatstream_streaming`] - Frame decoding and event interpretation
//! - [`chatstream_client`] - Configuration, auth, REST and the stream controller
//! - [`chatstream_conversation`] - Per-thread reconciliation of streamed replies
//!
//! Data flows one way: network bytes, frames, events, deltas, then the
//! thread's message list and the caller's callback.
//!
//! ## Cancellation
//!
//! ```ignore
//! let outcome = chat.send(&thread_id, "long question", |_: &str| {}).await?;
//! // elsewhere:
//! chat.cancel(&thread_id);
//! ```
//!
//! A cancelled send resolves with [`SendOutcome::Cancelled`]; it is not an
//! error.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// Client wiring
// ============================================================================

pub mod client;

// ============================================================================
// Re-exports of sub-crates
// ============================================================================

pub use chatstream_client as http;
pub use chatstream_conversation as conversation;
pub use chatstream_core as core;
pub use chatstream_streaming as streaming;

// ============================================================================
// Re-exports of key types
// ============================================================================

pub use chatstream_core::{
    now_utc, title_sample, Message, Role, SessionId, Thread, ThreadId, DEFAULT_THREAD_TITLE,
};

pub use chatstream_streaming::{
    interpret, ByteStreamExt, FrameDecoder, FrameSeparator, FrameStream, StreamError,
    StreamEvent, StreamResult,
};

pub use chatstream_client::{
    ApiClient, AuthSession, ChatStream, ClientConfig, ClientError, ClientResult,
    EndpointCandidates, HeaderSource, HttpChatStream, MessageStore, RequestShape, StreamOutcome,
    StreamRequest, StreamState,
};

pub use chatstream_conversation::{
    ConversationError, ConversationReconciler, ConversationResult, SendOutcome,
};

pub use client::{ChatClient, Conversation};

pub use tokio_util::sync::CancellationToken;

// ============================================================================
// Prelude Module
// ============================================================================

/// Convenient prelude for common imports.
///
/// ```ignore
/// use chatstream::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::{Message, Role, Thread, ThreadId};

    // Client
    pub use crate::{ApiClient, AuthSession, ChatClient, ClientConfig, ClientError, ClientResult};

    // Streaming
    pub use crate::{CancellationToken, ChatStream, FrameSeparator, StreamOutcome, StreamRequest};

    // Conversation
    pub use crate::{ConversationError, ConversationResult, SendOutcome};
}
