//! # chatstream-core
//!
//! Core types shared by the chatstream crates.
//!
//! - **Messages**: [`Role`] and [`Message`], the per-thread conversation entries
//! - **Threads**: [`Thread`] summaries and title helpers
//! - **Identifiers**: [`ThreadId`] and locally generated [`SessionId`]s
//!
//! ## Example
//!
//! ```rust
//! use chatstream_core::{Message, Role, Thread};
//!
//! let thread = Thread::new("t1", "");
//! let messages = vec![Message::user("What is a lifetime?")];
//!
//! assert_eq!(messages[0].role, Role::User);
//! assert_eq!(thread.display_title(&messages, 60), "What is a lifetime?");
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod identifier;
pub mod messages;
pub mod thread;

pub use identifier::{now_utc, SessionId, ThreadId};
pub use messages::{Message, Role};
pub use thread::{title_sample, Thread, DEFAULT_THREAD_TITLE};
