//! Context window fitting: budgets, weights, selection, and trimming.
//!
//! Fitting a conversation runs four stateless stages:
//!
//! 1. **[`budget`]**: [`BudgetPlan`] reserves room for the model's output
//!    and turns what is left into a character budget and a deficit.
//!
//! 2. **[`weight`]**: scores every message by length, age, role, and
//!    position. Assistant turns in the middle of the conversation score
//!    highest; system prompts and the first/last turns score lowest.
//!
//! 3. **[`selection`]**: picks the highest-scoring message that has not
//!    been fully trimmed yet.
//!
//! 4. **[`fit`]**: cuts the selected message down and repeats until the
//!    deficit is gone, no candidate is left, or the iteration bound is hit.
//!
//! [`fit_messages`] is the one-call entry point; [`fit_with_report`] also
//! returns the plan, every trim action, and whether the budget was met.

pub mod budget;
pub mod fit;
pub mod selection;
pub mod weight;

// Re-export commonly used items at the module level.
pub use budget::{BudgetPlan, CHARS_PER_TOKEN, MIN_CHARS_TO_PRESERVE, plan, reserved_output};
pub use fit::{
    ELLIPSIS, FitOutcome, MAX_ITERATIONS, StopReason, TRIM_TO_LEN, TrimAction, TrimKind,
    fit_messages, fit_with_report,
};
pub use selection::{find_largest, rank};
pub use weight::{TrimSet, WeightedMessage, weight};
