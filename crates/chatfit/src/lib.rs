//! Fit a chat conversation into a model's context window.
//!
//! `chatfit` takes an ordered list of chat turns and a context window size,
//! and shrinks the least valuable turns until the conversation fits the
//! input budget while leaving room for the model's reply. Fitting itself is
//! pure and synchronous: no I/O, no shared state, and it cannot fail.
//!
//! # Getting started
//!
//! ```
//! use chatfit::prelude::*;
//!
//! let messages = vec![
//!     Message::system("You are a helpful assistant."),
//!     Message::user("Summarize the attached report."),
//!     Message::assistant("Here is the summary..."),
//! ];
//!
//! // Plenty of room: the input comes back untouched, without a copy.
//! let fitted = fit_messages(&messages, 128_000, None);
//! assert!(matches!(fitted, std::borrow::Cow::Borrowed(_)));
//! ```
//!
//! Use [`fit_with_report`](context::fit_with_report) when the caller needs to
//! know what was trimmed and whether the result actually met the budget:
//!
//! ```
//! use chatfit::prelude::*;
//!
//! let messages = vec![
//!     Message::system("rules"),
//!     Message::user("hi"),
//!     Message::user("x".repeat(4000)),
//!     Message::assistant("y".repeat(4000)),
//!     Message::user("a"),
//!     Message::assistant("b"),
//!     Message::user("c"),
//!     Message::assistant("d"),
//! ];
//!
//! let outcome = fit_with_report(&messages, &FitConfig::new(2000));
//! assert!(outcome.within_budget());
//! assert_eq!(outcome.messages.len(), messages.len());
//! ```
//!
//! # Where to find things
//!
//! - **Budget arithmetic** (output reservation, character budget, deficit):
//!   [`context::budget`].
//! - **Which turn gets shrunk first:** [`context::weight`] scores turns by
//!   role, age and position; [`context::selection`] picks the next victim.
//! - **The trimming loop and its report:** [`context::fit`].
//! - **Tunable constants and JSON config files:** [`config::FitConfig`].

pub mod config;
pub mod context;
pub mod error;
pub mod prelude;

use serde::{Deserialize, Serialize};

pub use config::FitConfig;
pub use error::{Error, Result};

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Honors width and alignment flags.
        f.pad(self.as_str())
    }
}

/// A message in the conversation.
///
/// Only `content` is ever touched by fitting; the role and the message's
/// position in the list are preserved.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Content length in characters (Unicode scalar values).
    ///
    /// All budget arithmetic in this crate is done in this unit.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Total content length of a message list, in characters.
pub fn total_chars(messages: &[Message]) -> usize {
    messages.iter().map(Message::char_len).sum()
}
