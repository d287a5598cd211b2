//! Per-thread message reconciliation.
//!
//! The reconciler owns each thread's in-memory message list. A send appends
//! the user turn and an empty assistant placeholder, streams the reply into
//! the placeholder, then decides whether to persist it.
//!
//! At most one session is active per thread. A new send cancels the previous
//! session and waits until it has finalized before touching the list.
//!
//! Finalization policy:
//!
//! | Outcome   | Non-empty reply          | Empty reply         |
//! |-----------|--------------------------|---------------------|
//! | Completed | kept and persisted       | placeholder removed |
//! | Cancelled | kept, not persisted      | placeholder removed |
//! | Failed    | kept, not persisted      | placeholder removed |

use crate::error::{ConversationError, ConversationResult};
use chatstream_client::{ChatStream, MessageStore, StreamOutcome, StreamRequest};
use chatstream_core::{Message, Role, ThreadId};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a send ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The reply finished. Non-empty replies were persisted.
    Completed {
        /// Full reply text.
        text: String,
    },
    /// The send was cancelled, by [`ConversationReconciler::cancel`] or by a
    /// newer send on the same thread.
    Cancelled {
        /// Partial reply text.
        text: String,
    },
}

impl SendOutcome {
    /// Reply text, complete or partial.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            SendOutcome::Completed { text } | SendOutcome::Cancelled { text } => text,
        }
    }
}

struct ActiveSession {
    generation: u64,
    cancel: CancellationToken,
    finished: CancellationToken,
}

#[derive(Default)]
struct ThreadState {
    messages: Vec<Message>,
    active: Option<ActiveSession>,
    generation: u64,
}

impl ThreadState {
    fn is_current(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }
}

/// Handle returned when a session is registered.
struct Registration {
    generation: u64,
    placeholder: usize,
    cancel: CancellationToken,
    finished: CancellationToken,
}

/// Ends a registered session however the owning send exits.
///
/// Dropping an armed guard (the send future was dropped mid-flight) applies
/// the cancelled-session policy. `finished` fires in every case.
struct SessionGuard<'a, S, M>
where
    S: ChatStream,
    M: MessageStore,
{
    reconciler: &'a ConversationReconciler<S, M>,
    thread_id: &'a ThreadId,
    registration: Registration,
    armed: bool,
}

impl<S, M> SessionGuard<'_, S, M>
where
    S: ChatStream,
    M: MessageStore,
{
    fn finish(mut self, completed: bool) -> String {
        self.armed = false;
        self.reconciler
            .finish(self.thread_id, &self.registration, completed)
    }

    fn retract(mut self) {
        self.armed = false;
        self.reconciler.retract(self.thread_id, &self.registration);
    }
}

impl<S, M> Drop for SessionGuard<'_, S, M>
where
    S: ChatStream,
    M: MessageStore,
{
    fn drop(&mut self) {
        if self.armed {
            debug!(
                thread_id = %self.thread_id,
                generation = self.registration.generation,
                "Send dropped before finalizing"
            );
            self.reconciler
                .finish(self.thread_id, &self.registration, false);
        }
        self.registration.finished.cancel();
    }
}

/// Applies streamed replies to per-thread message lists.
pub struct ConversationReconciler<S, M> {
    stream: S,
    store: M,
    threads: Mutex<HashMap<ThreadId, ThreadState>>,
}

impl<S, M> std::fmt::Debug for ConversationReconciler<S, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationReconciler")
            .field("threads", &self.threads.lock().len())
            .finish_non_exhaustive()
    }
}

impl<S, M> ConversationReconciler<S, M>
where
    S: ChatStream,
    M: MessageStore,
{
    /// Create a reconciler over a reply stream and a message store.
    pub fn new(stream: S, store: M) -> Self {
        Self {
            stream,
            store,
            threads: Mutex::new(HashMap::new()),
        }
    }

    /// The reply stream.
    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// The message store.
    pub fn store(&self) -> &M {
        &self.store
    }

    /// Replace a thread's messages, e.g. after fetching them from the server.
    ///
    /// Any active session on the thread is cancelled and its remaining
    /// deltas are ignored.
    pub fn load(&self, thread_id: impl Into<ThreadId>, messages: Vec<Message>) {
        let thread_id = thread_id.into();
        let mut threads = self.threads.lock();
        let state = threads.entry(thread_id.clone()).or_default();
        if let Some(active) = state.active.take() {
            active.cancel.cancel();
        }
        debug!(thread_id = %thread_id, count = messages.len(), "Loaded messages");
        state.messages = messages;
    }

    /// Snapshot of a thread's messages.
    pub fn messages(&self, thread_id: &ThreadId) -> Vec<Message> {
        self.threads
            .lock()
            .get(thread_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Whether a reply is streaming into the thread.
    pub fn is_streaming(&self, thread_id: &ThreadId) -> bool {
        self.threads
            .lock()
            .get(thread_id)
            .is_some_and(|s| s.active.is_some())
    }

    /// Cancel the active session on a thread.
    ///
    /// Returns `false` if nothing was streaming.
    pub fn cancel(&self, thread_id: &ThreadId) -> bool {
        let threads = self.threads.lock();
        match threads.get(thread_id).and_then(|s| s.active.as_ref()) {
            Some(active) => {
                debug!(thread_id = %thread_id, generation = active.generation, "Cancelling stream");
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Send a user message and stream the reply into the thread.
    ///
    /// `on_delta` sees every delta after it has been applied to the
    /// message list.
    ///
    /// # Errors
    ///
    /// - [`ConversationError::EmptyMessage`] for blank input.
    /// - [`ConversationError::UserMessage`] if the user turn could not be
    ///   stored; the optimistic messages are removed.
    /// - [`ConversationError::Stream`] if the reply failed.
    /// - [`ConversationError::Persist`] if the finished reply could not be
    ///   stored; the reply stays in the list.
    pub async fn send(
        &self,
        thread_id: impl Into<ThreadId>,
        content: &str,
        mut on_delta: impl FnMut(&str) + Send,
    ) -> ConversationResult<SendOutcome> {
        if content.trim().is_empty() {
            return Err(ConversationError::EmptyMessage);
        }
        let thread_id = thread_id.into();

        let registration = loop {
            match self.try_register(&thread_id, content) {
                Ok(registration) => break registration,
                Err(previous) => {
                    debug!(thread_id = %thread_id, "Waiting for previous stream to finish");
                    previous.cancelled().await;
                }
            }
        };
        let cancel = registration.cancel.clone();
        let generation = registration.generation;
        let placeholder = registration.placeholder;
        let guard = SessionGuard {
            reconciler: self,
            thread_id: &thread_id,
            registration,
            armed: true,
        };

        if let Err(error) = self.store.send_user_message(&thread_id, content).await {
            warn!(thread_id = %thread_id, error = %error, "User message rejected");
            guard.retract();
            return Err(ConversationError::UserMessage(error));
        }

        let history = self.history(&thread_id, generation, placeholder);
        let request = StreamRequest::new(thread_id.clone(), content).with_history(history);

        let result = {
            let mut apply = |delta: &str| {
                self.apply_delta(&thread_id, generation, placeholder, delta);
                on_delta(delta);
            };
            self.stream.start_stream(&request, &mut apply, &cancel).await
        };

        let completed = result.as_ref().is_ok_and(|o| !o.is_cancelled());
        let reply = guard.finish(completed);

        match result {
            Ok(StreamOutcome::Completed { text, .. }) => {
                if !reply.is_empty() {
                    self.store
                        .persist_assistant_message(&thread_id, &reply)
                        .await
                        .map_err(|error| {
                            warn!(thread_id = %thread_id, error = %error, "Assistant reply not persisted");
                            ConversationError::Persist(error)
                        })?;
                }
                debug!(thread_id = %thread_id, len = text.len(), "Reply completed");
                Ok(SendOutcome::Completed { text })
            }
            Ok(StreamOutcome::Cancelled { text }) => {
                debug!(thread_id = %thread_id, len = text.len(), "Reply cancelled");
                Ok(SendOutcome::Cancelled { text })
            }
            Err(error) => Err(ConversationError::Stream(error)),
        }
    }

    /// Register a new session, or return the `finished` token of the session
    /// that must end first.
    fn try_register(
        &self,
        thread_id: &ThreadId,
        content: &str,
    ) -> Result<Registration, CancellationToken> {
        let mut threads = self.threads.lock();
        let state = threads.entry(thread_id.clone()).or_default();

        if let Some(active) = &state.active {
            if !active.finished.is_cancelled() {
                active.cancel.cancel();
                return Err(active.finished.clone());
            }
            // Finished but not yet cleared.
            state.active = None;
        }

        state.generation += 1;
        state.messages.push(Message::user(content));
        state.messages.push(Message::assistant(""));

        let registration = Registration {
            generation: state.generation,
            placeholder: state.messages.len() - 1,
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
        };
        state.active = Some(ActiveSession {
            generation: registration.generation,
            cancel: registration.cancel.clone(),
            finished: registration.finished.clone(),
        });
        debug!(thread_id = %thread_id, generation = registration.generation, "Stream session registered");
        Ok(registration)
    }

    fn history(&self, thread_id: &ThreadId, generation: u64, placeholder: usize) -> Vec<Message> {
        let threads = self.threads.lock();
        threads
            .get(thread_id)
            .filter(|s| s.is_current(generation))
            .map(|s| s.messages[..placeholder].to_vec())
            .unwrap_or_default()
    }

    fn apply_delta(&self, thread_id: &ThreadId, generation: u64, placeholder: usize, delta: &str) {
        let mut threads = self.threads.lock();
        let Some(state) = threads.get_mut(thread_id) else {
            return;
        };
        if !state.is_current(generation) {
            return;
        }
        if let Some(message) = state.messages.get_mut(placeholder) {
            message.push_delta(delta);
        }
    }

    /// Remove the optimistic user turn and placeholder.
    fn retract(&self, thread_id: &ThreadId, registration: &Registration) {
        let mut threads = self.threads.lock();
        let Some(state) = threads.get_mut(thread_id) else {
            return;
        };
        if !state.is_current(registration.generation) {
            return;
        }
        state.active = None;
        let user = registration.placeholder - 1;
        if state.messages.len() > registration.placeholder {
            state.messages.drain(user..=registration.placeholder);
        }
    }

    /// End the session and apply the finalization policy. Returns the reply
    /// content left in the list.
    fn finish(&self, thread_id: &ThreadId, registration: &Registration, completed: bool) -> String {
        let mut threads = self.threads.lock();
        let Some(state) = threads.get_mut(thread_id) else {
            return String::new();
        };
        if !state.is_current(registration.generation) {
            return String::new();
        }
        state.active = None;

        let placeholder = registration.placeholder;
        let content = match state.messages.get(placeholder) {
            Some(m) if m.role == Role::Assistant => m.content.clone(),
            _ => return String::new(),
        };

        if content.is_empty() {
            state.messages.remove(placeholder);
            debug!(thread_id = %thread_id, completed, "Dropped empty assistant placeholder");
        } else if !completed {
            debug!(thread_id = %thread_id, len = content.len(), "Keeping partial reply");
        }
        content
    }
}
