//! # chatstream-streaming
//!
//! Incremental decoding of streamed chat replies.
//!
//! Data flows one way: network bytes go through the [`FrameDecoder`], each
//! frame is classified by [`interpret`] into a [`StreamEvent`], and the
//! caller decides what to do with the event.
//!
//! ## Core Concepts
//!
//! - **[`Utf8ChunkDecoder`]**: UTF-8 decoding that survives characters split across reads
//! - **[`FrameDecoder`]**: Splits text into frames on a [`FrameSeparator`]
//! - **[`FrameStream`]**: Async adapter from a byte stream to a frame stream
//! - **[`interpret`]**: Pure classification of one frame
//!
//! ## Example
//!
//! ```rust
//! use chatstream_streaming::{interpret, FrameDecoder, FrameSeparator, StreamEvent};
//!
//! let mut decoder = FrameDecoder::new(FrameSeparator::Blank);
//! let frames = decoder
//!     .feed_str("data: {\"type\":\"chunk\",\"value\":\"Hel\"}\n\ndata: [DONE]\n\n")
//!     .unwrap();
//!
//! let events: Vec<_> = frames.iter().filter_map(|f| interpret(f)).collect();
//! assert_eq!(
//!     events,
//!     vec![StreamEvent::IncrementalText("Hel".into()), StreamEvent::Terminal]
//! );
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod decoder;
pub mod error;
pub mod event;
pub mod frame;

// Re-exports
pub use decoder::Utf8ChunkDecoder;
pub use error::{StreamError, StreamResult};
pub use event::{extract_payload, interpret, StreamEvent, DONE_SENTINEL};
pub use frame::{ByteStreamExt, FrameDecoder, FrameSeparator, FrameStream};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        interpret, ByteStreamExt, FrameDecoder, FrameSeparator, FrameStream, StreamError,
        StreamEvent, StreamResult,
    };
}
