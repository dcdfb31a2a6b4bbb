//! Victim selection: pick the next message to shrink.

use crate::Message;
use crate::context::weight::{TrimSet, WeightedMessage, weight, weighted};

/// Index of the message with the strictly largest weight.
///
/// One pass, first index wins ties. Returns `None` when the list is empty
/// or every weight is zero (all candidates trimmed or empty).
pub fn find_largest(messages: &[Message], trim_set: &TrimSet) -> Option<usize> {
    let count = messages.len();
    let mut best = None;
    let mut max_weight = 0.0;

    for (index, message) in messages.iter().enumerate() {
        let w = weight(message, index, count, trim_set);
        if w > max_weight {
            max_weight = w;
            best = Some(index);
        }
    }

    best
}

/// All messages ordered from most to least eager to be shrunk.
///
/// Equal weights keep their original order, matching [`find_largest`], so
/// the first entry is always the message `find_largest` would pick (when
/// its weight is non-zero).
pub fn rank<'a>(messages: &'a [Message], trim_set: &TrimSet) -> Vec<WeightedMessage<'a>> {
    let mut ranked = weighted(messages, trim_set);
    ranked.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    ranked
}
