//! # chatstream-client
//!
//! HTTP side of chatstream: the REST client for auth, threads and messages,
//! and the controller that turns a streaming response into text deltas.
//!
//! ## Core Concepts
//!
//! - **[`ClientConfig`]**: Base URL, timeouts, framing dialect and stream paths
//! - **[`AuthSession`]**: Bearer and CSRF tokens, exposed as a [`HeaderSource`]
//! - **[`EndpointCandidates`]**: Ordered path fallback on not-found
//! - **[`ApiClient`]**: REST operations for auth, threads and messages
//! - **[`HttpChatStream`]**: A [`ChatStream`] that reads replies over HTTP
//!
//! ## Example
//!
//! ```rust,ignore
//! use chatstream_client::prelude::*;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = ClientConfig::new("http://localhost:3000")?;
//! let session = Arc::new(AuthSession::with_token("jwt"));
//! let stream = HttpChatStream::new(config, session)?;
//!
//! let outcome = stream
//!     .start_stream(
//!         &StreamRequest::new("t1", "hello"),
//!         &mut |delta: &str| print!("{delta}"),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod api;
pub mod auth;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod store;
pub mod stream;

// Re-exports
pub use api::{ApiClient, AuthResponse, GENERATE_TITLE_PATH};
pub use auth::{AuthSession, HeaderSource, CSRF_HEADER};
pub use config::{ClientConfig, RequestShape, DEFAULT_STREAM_PATHS};
pub use endpoint::EndpointCandidates;
pub use error::{error_message, ClientError, ClientResult};
pub use store::MessageStore;
pub use stream::{
    ChatStream, HttpChatStream, StreamOutcome, StreamRequest, StreamSession, StreamState,
};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        ApiClient, AuthSession, ChatStream, ClientConfig, ClientError, ClientResult,
        HeaderSource, HttpChatStream, MessageStore, RequestShape, StreamOutcome, StreamRequest,
    };
}
