//! Trim weights: how eager we are to shrink each message.
//!
//! A message's weight is its length scaled by three multipliers:
//!
//! - **Ramp**: from ~2 for the first message down to ~1 for the last, so
//!   older turns go before newer ones of the same role.
//! - **Role**: assistant turns ×10 (they can be regenerated), user turns ×1,
//!   system prompts ×0.01.
//! - **Anchor**: ×0.05 for the first two and the last four turns, which
//!   hold the conversation's identity and its live thread.
//!
//! Messages already fully trimmed in the current call weigh 0 and are never
//! picked again.
//!
//! For four messages or fewer the tail bound `n - 1 - 3` is not positive,
//! so the "last four" rule alone covers every index. Up to six messages the
//! head and tail anchors together still cover everything. Either way all
//! messages are damped alike and ordering falls back to length, ramp and role.

use std::collections::BTreeSet;

use crate::{Message, MessageRole};

/// Multiplier applied to anchored (first two / last four) messages.
pub const ANCHOR_MULTIPLIER: f64 = 0.05;

/// Last index protected by the head anchor.
const LAST_HEAD_ANCHOR: usize = 1;

/// Offset from the end used by the trailing anchor rule.
const TRAILING_ANCHORS: i64 = 3;

/// Indices fully trimmed during one fitting call.
///
/// Insert-only. Once an index is in the set it stays there for the rest of
/// the call and its message is never selected again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrimSet(BTreeSet<usize>);

impl TrimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `index` as fully trimmed. Returns `false` if it already was.
    pub fn insert(&mut self, index: usize) -> bool {
        self.0.insert(index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Trimmed indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }
}

/// Role multiplier: assistant turns are shrunk first, system prompts last.
pub fn role_multiplier(role: MessageRole) -> f64 {
    match role {
        MessageRole::User => 1.0,
        MessageRole::System => 0.01,
        MessageRole::Assistant => 10.0,
    }
}

/// Age multiplier, ~2 for the oldest message and 1 for the newest.
pub fn ramp_multiplier(index: usize, message_count: usize) -> f64 {
    let n = message_count as f64;
    1.0 + (n - 1.0 - index as f64) / n
}

/// Whether `index` falls in the protected head or tail of the conversation.
pub fn is_anchored(index: usize, message_count: usize) -> bool {
    // Signed on purpose: for short conversations the tail bound goes
    // negative and every index counts as anchored.
    index <= LAST_HEAD_ANCHOR || index as i64 >= message_count as i64 - 1 - TRAILING_ANCHORS
}

/// Weight of the message at `index` in a list of `message_count` messages.
pub fn weight(message: &Message, index: usize, message_count: usize, trim_set: &TrimSet) -> f64 {
    if trim_set.contains(index) {
        return 0.0;
    }

    let anchor = if is_anchored(index, message_count) {
        ANCHOR_MULTIPLIER
    } else {
        1.0
    };

    message.char_len() as f64
        * ramp_multiplier(index, message_count)
        * role_multiplier(message.role)
        * anchor
}

/// A message paired with its position and current weight.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedMessage<'a> {
    pub message: &'a Message,
    pub index: usize,
    pub weight: f64,
}

/// Weigh every message in order.
pub fn weighted<'a>(messages: &'a [Message], trim_set: &TrimSet) -> Vec<WeightedMessage<'a>> {
    let count = messages.len();
    messages
        .iter()
        .enumerate()
        .map(|(index, message)| WeightedMessage {
            message,
            index,
            weight: weight(message, index, count, trim_set),
        })
        .collect()
}
