//! Frame decoding.
//!
//! Turns a chunked byte stream into delimiter-bounded text frames. Chunk
//! boundaries are transparent: the same body yields the same frames however
//! it is split across reads.

use crate::decoder::Utf8ChunkDecoder;
use crate::error::{StreamError, StreamResult};
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use std::collections::VecDeque;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};
use tracing::trace;

/// Default limit on an unterminated frame held in the buffer.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 10 * 1024 * 1024;

/// Separator between frames, which depends on the server dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FrameSeparator {
    /// Blank line (`"\n\n"`), standard server-sent events.
    #[default]
    Blank,
    /// Single newline (`"\n"`), one event per line.
    Line,
}

impl FrameSeparator {
    /// The separator text.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameSeparator::Blank => "\n\n",
            FrameSeparator::Line => "\n",
        }
    }
}

impl FromStr for FrameSeparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "\n\n" => return Ok(FrameSeparator::Blank),
            "\n" => return Ok(FrameSeparator::Line),
            _ => {}
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "blank" | "double" | "\\n\\n" => Ok(FrameSeparator::Blank),
            "line" | "single" | "\\n" => Ok(FrameSeparator::Line),
            other => Err(format!("unknown frame separator: {other:?}")),
        }
    }
}

/// Incremental frame decoder.
#[derive(Debug)]
pub struct FrameDecoder {
    separator: FrameSeparator,
    decoder: Utf8ChunkDecoder,
    buffer: String,
    max_buffer: usize,
    // '\r' at the end of a chunk, held until we know whether '\n' follows.
    pending_cr: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(FrameSeparator::default())
    }
}

impl FrameDecoder {
    /// Create a decoder for the given separator.
    #[must_use]
    pub fn new(separator: FrameSeparator) -> Self {
        Self {
            separator,
            decoder: Utf8ChunkDecoder::new(),
            buffer: String::new(),
            max_buffer: DEFAULT_MAX_BUFFER_SIZE,
            pending_cr: false,
        }
    }

    /// Set the maximum size of an unterminated frame.
    #[must_use]
    pub fn with_max_buffer(mut self, max_buffer: usize) -> Self {
        self.max_buffer = max_buffer;
        self
    }

    /// The separator this decoder splits on.
    #[must_use]
    pub fn separator(&self) -> FrameSeparator {
        self.separator
    }

    /// Feed one chunk of bytes and return every frame it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> StreamResult<Vec<String>> {
        let text = self.decoder.decode(bytes);
        self.push_text(&text);

        let frames = self.drain_frames();

        if self.buffer.len() > self.max_buffer {
            return Err(StreamError::BufferOverflow {
                limit: self.max_buffer,
            });
        }

        Ok(frames)
    }

    /// Feed a string. Used when the body is already text.
    pub fn feed_str(&mut self, s: &str) -> StreamResult<Vec<String>> {
        self.feed(s.as_bytes())
    }

    /// Call when the stream ends to flush the final unterminated frame.
    pub fn finish(&mut self) -> Option<String> {
        let tail = self.decoder.finish();
        self.buffer.push_str(&tail);
        if std::mem::take(&mut self.pending_cr) {
            self.buffer.push('\r');
        }

        let remainder = std::mem::take(&mut self.buffer);
        if remainder.trim().is_empty() {
            None
        } else {
            trace!(len = remainder.len(), "Flushing unterminated final frame");
            Some(remainder)
        }
    }

    /// Whether unconsumed text is buffered.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || self.pending_cr || self.decoder.has_pending()
    }

    fn push_text(&mut self, text: &str) {
        let mut text = if std::mem::take(&mut self.pending_cr) {
            format!("\r{text}")
        } else {
            text.to_owned()
        };

        if text.ends_with('\r') {
            text.pop();
            self.pending_cr = true;
        }

        if text.contains("\r\n") {
            text = text.replace("\r\n", "\n");
        }
        self.buffer.push_str(&text);
    }

    fn drain_frames(&mut self) -> Vec<String> {
        let separator = self.separator.as_str();
        let mut frames = Vec::new();
        let mut consumed = 0;

        while let Some(pos) = self.buffer[consumed..].find(separator) {
            let frame = &self.buffer[consumed..consumed + pos];
            if !frame.trim().is_empty() {
                frames.push(frame.to_owned());
            }
            consumed += pos + separator.len();
        }

        if consumed > 0 {
            self.buffer.drain(..consumed);
        }

        frames
    }
}

pin_project! {
    /// Stream adapter that yields frames from a byte stream.
    pub struct FrameStream<S> {
        #[pin]
        inner: S,
        decoder: FrameDecoder,
        frames: VecDeque<String>,
        finished: bool,
    }
}

impl<S> FrameStream<S> {
    /// Create a frame stream over `inner`.
    pub fn new(inner: S, separator: FrameSeparator) -> Self {
        Self::with_decoder(inner, FrameDecoder::new(separator))
    }

    /// Create a frame stream with a preconfigured decoder.
    pub fn with_decoder(inner: S, decoder: FrameDecoder) -> Self {
        Self {
            inner,
            decoder,
            frames: VecDeque::new(),
            finished: false,
        }
    }
}

impl<S, E> Stream for FrameStream<S>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    type Item = StreamResult<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(frame) = this.frames.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }

            if *this.finished {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => match this.decoder.feed(&bytes) {
                    Ok(frames) => this.frames.extend(frames),
                    Err(error) => {
                        *this.finished = true;
                        return Poll::Ready(Some(Err(error)));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(StreamError::transport(e))));
                }
                Poll::Ready(None) => {
                    *this.finished = true;
                    if let Some(frame) = this.decoder.finish() {
                        this.frames.push_back(frame);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Extension trait for turning byte streams into frame streams.
pub trait ByteStreamExt: Sized {
    /// Split this byte stream into frames.
    fn into_frames(self, separator: FrameSeparator) -> FrameStream<Self>;
}

impl<S, E> ByteStreamExt for S
where
    S: Stream<Item = Result<Bytes, E>>,
{
    fn into_frames(self, separator: FrameSeparator) -> FrameStream<Self> {
        FrameStream::new(self, separator)
    }
}
