//! Thread summaries and title helpers.

use serde::{Deserialize, Serialize};

use crate::identifier::ThreadId;
use crate::messages::{Message, Role};

/// Title given to threads created without one.
pub const DEFAULT_THREAD_TITLE: &str = "New chat";

/// Placeholder titles that count as "untitled" when deciding on auto-titling.
const PLACEHOLDER_TITLES: &[&str] = &[DEFAULT_THREAD_TITLE, "Nuevo chat"];

/// Maximum characters of user text sent to the title generator.
pub const TITLE_SAMPLE_LEN: usize = 200;

/// A conversation thread as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    /// Server-assigned id (`_id` or `id` on the wire).
    #[serde(rename = "_id", alias = "id")]
    pub id: ThreadId,
    /// Explicit title, possibly empty.
    #[serde(default)]
    pub title: String,
}

impl Thread {
    /// Create a thread summary.
    #[must_use]
    pub fn new(id: impl Into<ThreadId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }

    /// Title to show for this thread.
    ///
    /// Uses the explicit title when set, otherwise the first non-blank user
    /// message, otherwise [`DEFAULT_THREAD_TITLE`]. Truncated to `max`
    /// characters with a trailing ellipsis.
    #[must_use]
    pub fn display_title(&self, messages: &[Message], max: usize) -> String {
        let explicit = self.title.trim();
        if !explicit.is_empty() {
            return truncate_chars(explicit, max);
        }

        let first_user = messages
            .iter()
            .find(|m| m.role == Role::User && !m.content.trim().is_empty())
            .map(|m| m.content.trim())
            .unwrap_or(DEFAULT_THREAD_TITLE);

        truncate_chars(first_user, max)
    }

    /// Whether this thread still carries a placeholder title.
    #[must_use]
    pub fn needs_auto_title(&self) -> bool {
        let title = self.title.trim();
        title.is_empty() || PLACEHOLDER_TITLES.contains(&title)
    }
}

/// Text sample used to generate a title: user turns joined by spaces,
/// limited to [`TITLE_SAMPLE_LEN`] characters.
#[must_use]
pub fn title_sample(messages: &[Message]) -> String {
    let joined = messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    joined.chars().take(TITLE_SAMPLE_LEN).collect()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let mut out: String = s.chars().take(max).collect();
        out.push('…');
        out
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_accepts_both_id_spellings() {
        let a: Thread = serde_json::from_str(r#"{"_id":"1","title":"A"}"#).unwrap();
        let b: Thread = serde_json::from_str(r#"{"id":"2"}"#).unwrap();
        assert_eq!(a.id.as_str(), "1");
        assert_eq!(b.id.as_str(), "2");
        assert_eq!(b.title, "");
    }

    #[test]
    fn test_display_title_prefers_explicit() {
        let thread = Thread::new("1", "  Trip plans ");
        assert_eq!(thread.display_title(&[], 60), "Trip plans");
    }

    #[test]
    fn test_display_title_falls_back_to_first_user_message() {
        let thread = Thread::new("1", "");
        let messages = vec![
            Message::system("be nice"),
            Message::user("   "),
            Message::user("How do lifetimes work?"),
        ];
        assert_eq!(thread.display_title(&messages, 60), "How do lifetimes work?");
        assert_eq!(thread.display_title(&[], 60), DEFAULT_THREAD_TITLE);
    }

    #[test]
    fn test_display_title_truncates_on_chars() {
        let thread = Thread::new("1", "ñandú ñandú");
        assert_eq!(thread.display_title(&[], 5), "ñandú…");
    }

    #[test]
    fn test_needs_auto_title() {
        assert!(Thread::new("1", "").needs_auto_title());
        assert!(Thread::new("1", "New chat").needs_auto_title());
        assert!(Thread::new("1", "Nuevo chat").needs_auto_title());
        assert!(!Thread::new("1", "Rust questions").needs_auto_title());
    }

    #[test]
    fn test_title_sample_joins_user_turns() {
        let messages = vec![
            Message::user("first"),
            Message::assistant("ignored"),
            Message::user("second"),
        ];
        assert_eq!(title_sample(&messages), "first second");

        let long = vec![Message::user("x".repeat(500))];
        assert_eq!(title_sample(&long).len(), TITLE_SAMPLE_LEN);
    }
}
