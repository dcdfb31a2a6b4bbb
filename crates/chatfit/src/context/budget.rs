//! Budget planning: how much of the context window is left for history.
//!
//! The model needs room for its reply, so a share of the window is reserved
//! for output before anything is spent on input. The reservation is at least
//! half the window, or a larger explicit reservation. What is left is
//! converted to characters with a fixed chars-per-token ratio and floored at
//! [`MIN_CHARS_TO_PRESERVE`], so tiny windows never force a conversation down
//! to nothing.

use crate::Message;
use crate::config::FitConfig;

/// Characters per token. A fixed approximation, not a tokenizer.
pub const CHARS_PER_TOKEN: u32 = 4;

/// Output reservation (in tokens) used when the caller gives none.
pub const DEFAULT_OUTPUT_RESERVATION: u32 = 4096;

/// The character budget never drops below this, however small the window.
pub const MIN_CHARS_TO_PRESERVE: usize = 5000;

/// Tokens reserved for the model's reply.
///
/// `max(context_window / 2, custom_reservation.unwrap_or(4096))`. Half-token
/// results for odd windows are kept as-is rather than rounded.
pub fn reserved_output(context_window: u32, custom_reservation: Option<u32>) -> f64 {
    reserve(
        context_window,
        custom_reservation.unwrap_or(DEFAULT_OUTPUT_RESERVATION),
    )
}

fn reserve(context_window: u32, reservation: u32) -> f64 {
    (f64::from(context_window) / 2.0).max(f64::from(reservation))
}

/// The outcome of budget planning for one message list.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetPlan {
    /// Context window in tokens.
    pub context_window: u32,
    /// Tokens held back for the model's output.
    pub reserved_output: f64,
    /// Tokens left for input history. Negative when the reservation
    /// exceeds the window.
    pub available_for_context: f64,
    /// Character budget for the whole message list.
    pub budget_chars: usize,
    /// Character count of the message list as given.
    pub total_chars: usize,
    /// Characters that must be removed to fit. Zero or negative means the
    /// list already fits.
    pub deficit: i64,
}

impl BudgetPlan {
    /// Whether any trimming is required.
    pub fn needs_trim(&self) -> bool {
        self.deficit > 0
    }

    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        format!(
            "budget: {} chars for {} chars of history (deficit {}; {} of {} tokens reserved for output)",
            self.budget_chars,
            self.total_chars,
            self.deficit,
            self.reserved_output,
            self.context_window,
        )
    }
}

/// Plan the budget for `messages` under `config`.
pub fn plan(messages: &[Message], config: &FitConfig) -> BudgetPlan {
    let total_chars = crate::total_chars(messages);
    plan_for_total(total_chars, config)
}

/// Plan the budget for a known total character count.
pub fn plan_for_total(total_chars: usize, config: &FitConfig) -> BudgetPlan {
    let reserved_output = reserve(config.context_window, config.effective_reservation());
    let available_for_context = f64::from(config.context_window) - reserved_output;

    let budget = (available_for_context * f64::from(config.chars_per_token)).floor();
    // `max` with a non-negative floor makes the cast lossless in sign.
    let budget_chars = budget.max(config.min_chars_to_preserve as f64) as usize;

    let deficit = total_chars as i64 - budget_chars as i64;

    BudgetPlan {
        context_window: config.context_window,
        reserved_output,
        available_for_context,
        budget_chars,
        total_chars,
        deficit,
    }
}
