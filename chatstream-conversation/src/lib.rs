//! # chatstream-conversation
//!
//! Keeps each thread's message list in step with a streamed reply.
//!
//! [`ConversationReconciler`] sits between a [`ChatStream`] and a
//! [`MessageStore`]: it appends the optimistic user turn, grows the
//! assistant placeholder delta by delta, and persists the reply once the
//! stream completes. Starting a send on a thread that is already streaming
//! cancels the older session first.
//!
//! ```rust,ignore
//! use chatstream_conversation::ConversationReconciler;
//!
//! let reconciler = ConversationReconciler::new(stream, api);
//! let outcome = reconciler
//!     .send("t1", "hello", |delta: &str| print!("{delta}"))
//!     .await?;
//! ```
//!
//! [`ChatStream`]: chatstream_client::ChatStream
//! [`MessageStore`]: chatstream_client::MessageStore

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod reconciler;

pub use error::{ConversationError, ConversationResult};
pub use reconciler::{ConversationReconciler, SendOutcome};
