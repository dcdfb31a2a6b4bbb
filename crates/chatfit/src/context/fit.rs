//! The trimming loop: shrink weighted messages until the conversation fits.
//!
//! Each round weighs the working copy, picks the heaviest message, and
//! either cuts it down to [`TRIM_TO_LEN`] (a *full trim*) or, when that
//! would remove more than needed, cuts exactly the remaining excess (a
//! *partial trim*) and stops. Shortened content always ends in [`ELLIPSIS`].
//!
//! Fitting is best-effort and never fails. If the candidates run out or the
//! iteration bound is hit first, the result may still exceed the budget;
//! [`FitOutcome::within_budget`] tells the caller whether it did.
//!
//! Refitting a fitted conversation is a no-op, except after a run that
//! stopped at the iteration bound: messages the loop never reached are still
//! untrimmed, so a second call continues where the first left off.

use std::borrow::Cow;

use tracing::{debug, trace, warn};

use crate::config::FitConfig;
use crate::context::budget::{BudgetPlan, plan};
use crate::context::selection::find_largest;
use crate::context::weight::TrimSet;
use crate::{Message, MessageRole};

/// Length (in characters, marker included) a fully trimmed message is cut to.
pub const TRIM_TO_LEN: usize = 1000;

/// Marker appended to every shortened message.
pub const ELLIPSIS: &str = "...";

/// Upper bound on selection/trim rounds per call.
pub const MAX_ITERATIONS: usize = 100;

/// What happened to a selected message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimKind {
    /// Cut to the full-trim length.
    Full,
    /// Cut by exactly the remaining deficit; always the last action.
    Partial,
    /// Already at or below the full-trim length. Left unchanged and retired.
    Skipped,
}

/// One step of the trimming loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimAction {
    pub index: usize,
    pub role: MessageRole,
    pub kind: TrimKind,
    pub chars_before: usize,
    pub chars_after: usize,
}

impl TrimAction {
    /// Characters removed by this action.
    pub fn saved(&self) -> usize {
        self.chars_before.saturating_sub(self.chars_after)
    }
}

/// Why the trimming loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The input already fit; nothing was copied or trimmed.
    UnderBudget,
    /// The deficit was fully removed.
    DeficitClosed,
    /// Every message was trimmed, empty, or retired.
    NoCandidate,
    /// The iteration bound was reached.
    IterationCap,
}

/// The fitted conversation plus a record of how it got there.
#[derive(Debug, Clone)]
pub struct FitOutcome<'a> {
    /// The fitted messages. Borrowed from the input when nothing was trimmed.
    pub messages: Cow<'a, [Message]>,
    /// Budget computed for the input.
    pub plan: BudgetPlan,
    /// Trim actions in the order they were applied.
    pub actions: Vec<TrimAction>,
    /// Selection rounds performed.
    pub iterations: usize,
    /// Total content length of `messages`, in characters.
    pub final_chars: usize,
    pub stop_reason: StopReason,
}

impl FitOutcome<'_> {
    /// Whether the fitted conversation is within the character budget.
    pub fn within_budget(&self) -> bool {
        self.final_chars <= self.plan.budget_chars
    }

    /// Characters still over budget (zero when within budget).
    pub fn overflow(&self) -> usize {
        self.final_chars.saturating_sub(self.plan.budget_chars)
    }

    /// Whether any message content changed.
    pub fn was_trimmed(&self) -> bool {
        self.actions.iter().any(|a| a.kind != TrimKind::Skipped)
    }

    /// Take ownership of the fitted messages.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages.into_owned()
    }

    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        let full = self
            .actions
            .iter()
            .filter(|a| a.kind == TrimKind::Full)
            .count();
        let partial = self
            .actions
            .iter()
            .filter(|a| a.kind == TrimKind::Partial)
            .count();
        format!(
            "fit: {} -> {} chars (budget {}), {full} full / {partial} partial trim(s) in {} round(s), stop: {:?}",
            self.plan.total_chars,
            self.final_chars,
            self.plan.budget_chars,
            self.iterations,
            self.stop_reason,
        )
    }
}

/// Fit `messages` into `context_window` tokens, reserving
/// `custom_reservation` tokens (default 4096) for output.
///
/// Returns the input unchanged (borrowed) when it already fits.
pub fn fit_messages(
    messages: &[Message],
    context_window: u32,
    custom_reservation: Option<u32>,
) -> Cow<'_, [Message]> {
    let config = FitConfig::new(context_window).with_optional_reservation(custom_reservation);
    fit_with_report(messages, &config).messages
}

/// Fit `messages` under `config` and report what was done.
pub fn fit_with_report<'a>(messages: &'a [Message], config: &FitConfig) -> FitOutcome<'a> {
    let plan = plan(messages, config);

    if !plan.needs_trim() {
        debug!(
            messages = messages.len(),
            "{}; no trim needed",
            plan.to_log_string()
        );
        return FitOutcome {
            messages: Cow::Borrowed(messages),
            final_chars: plan.total_chars,
            plan,
            actions: Vec::new(),
            iterations: 0,
            stop_reason: StopReason::UnderBudget,
        };
    }

    debug!(messages = messages.len(), "{}", plan.to_log_string());

    let mut working = messages.to_vec();
    let mut trim_set = TrimSet::new();
    let mut actions = Vec::new();
    let mut remaining = plan.deficit.unsigned_abs() as usize;
    let mut iterations = 0;
    // A full trim can never go below the marker itself.
    let floor = config.trim_to_len.max(ELLIPSIS.len());

    let stop_reason = loop {
        if iterations >= config.max_iterations {
            break StopReason::IterationCap;
        }
        iterations += 1;

        let Some(index) = find_largest(&working, &trim_set) else {
            break StopReason::NoCandidate;
        };

        let message = &mut working[index];
        let chars_before = message.char_len();

        if chars_before <= floor {
            trim_set.insert(index);
            actions.push(record(index, message, TrimKind::Skipped, chars_before));
            continue;
        }

        let full_trim_savings = chars_before - floor;

        if full_trim_savings > remaining {
            let keep = chars_before.saturating_sub(remaining + ELLIPSIS.len());
            message.content = shorten(&message.content, keep, true);
            actions.push(record(index, message, TrimKind::Partial, chars_before));
            break StopReason::DeficitClosed;
        }

        let keep = floor - ELLIPSIS.len();
        message.content = shorten(&message.content, keep, false);
        trim_set.insert(index);
        actions.push(record(index, message, TrimKind::Full, chars_before));

        remaining -= full_trim_savings;
        if remaining == 0 {
            break StopReason::DeficitClosed;
        }
    };

    let final_chars = crate::total_chars(&working);
    let outcome = FitOutcome {
        messages: Cow::Owned(working),
        plan,
        actions,
        iterations,
        final_chars,
        stop_reason,
    };

    if outcome.within_budget() {
        debug!("{}", outcome.to_log_string());
    } else {
        warn!(
            overflow = outcome.overflow(),
            "{}; still over budget",
            outcome.to_log_string()
        );
    }

    outcome
}

/// Keep the first `keep` characters, optionally trim surrounding whitespace,
/// and append the marker.
fn shorten(content: &str, keep: usize, trim_whitespace: bool) -> String {
    let end = content
        .char_indices()
        .nth(keep)
        .map_or(content.len(), |(byte, _)| byte);
    let head = content.get(..end).unwrap_or(content);
    let head = if trim_whitespace { head.trim() } else { head };

    let mut shortened = String::with_capacity(head.len() + ELLIPSIS.len());
    shortened.push_str(head);
    shortened.push_str(ELLIPSIS);
    shortened
}

fn record(index: usize, message: &Message, kind: TrimKind, chars_before: usize) -> TrimAction {
    let action = TrimAction {
        index,
        role: message.role,
        kind,
        chars_before,
        chars_after: message.char_len(),
    };
    trace!(
        index,
        role = %action.role,
        kind = ?action.kind,
        before = action.chars_before,
        after = action.chars_after,
        "trimmed message"
    );
    action
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_messages(shape: &[(MessageRole, usize)]) -> Vec<Message> {
        shape
            .iter()
            .map(|&(role, len)| Message::new(role, "x".repeat(len)))
            .collect()
    }

    fn lengths(messages: &[Message]) -> Vec<usize> {
        messages.iter().map(Message::char_len).collect()
    }

    fn scenario() -> Vec<Message> {
        use MessageRole::*;
        make_messages(&[
            (System, 50),
            (User, 50),
            (User, 4000),
            (Assistant, 4000),
            (User, 50),
            (Assistant, 50),
            (User, 50),
            (Assistant, 50),
        ])
    }

    #[test]
    fn under_budget_returns_borrowed_input() {
        let messages = scenario();
        let fitted = fit_messages(&messages, 128_000, None);
        assert!(matches!(fitted, Cow::Borrowed(_)));
        assert_eq!(fitted.as_ptr(), messages.as_ptr());
    }

    #[test]
    fn scenario_trims_assistant_fully_then_user_partially() {
        let messages = scenario();
        let outcome = fit_with_report(&messages, &FitConfig::new(2000));

        assert_eq!(outcome.plan.deficit, 3300);
        assert_eq!(
            lengths(&outcome.messages),
            vec![50, 50, 3700, 1000, 50, 50, 50, 50]
        );
        assert_eq!(outcome.final_chars, 5000);
        assert!(outcome.within_budget());
        assert_eq!(outcome.stop_reason, StopReason::DeficitClosed);
        assert_eq!(outcome.iterations, 2);

        assert_eq!(outcome.actions.len(), 2);
        assert_eq!(outcome.actions[0].index, 3);
        assert_eq!(outcome.actions[0].kind, TrimKind::Full);
        assert_eq!(outcome.actions[0].saved(), 3000);
        assert_eq!(outcome.actions[1].index, 2);
        assert_eq!(outcome.actions[1].kind, TrimKind::Partial);
        assert_eq!(outcome.actions[1].saved(), 300);
    }

    #[test]
    fn shortened_content_ends_with_marker() {
        let messages = scenario();
        let fitted = fit_messages(&messages, 2000, None);
        assert!(fitted[2].content.ends_with(ELLIPSIS));
        assert!(fitted[3].content.ends_with(ELLIPSIS));
        assert!(fitted[3].content.starts_with(&"x".repeat(997)));
        assert_eq!(fitted[0], messages[0]);
    }

    #[test]
    fn input_is_not_mutated() {
        let messages = scenario();
        let before = messages.clone();
        let _ = fit_messages(&messages, 2000, None);
        assert_eq!(messages, before);
    }

    #[test]
    fn custom_reservation_tightens_budget() {
        // 100_000 window, 95_000 reserved: 5000 tokens * 4 = 20_000 chars.
        let messages = make_messages(&[
            (MessageRole::System, 100),
            (MessageRole::User, 100),
            (MessageRole::User, 15_000),
            (MessageRole::Assistant, 15_000),
            (MessageRole::User, 100),
            (MessageRole::Assistant, 100),
            (MessageRole::User, 100),
            (MessageRole::Assistant, 100),
        ]);
        let loose = fit_messages(&messages, 100_000, None);
        assert!(matches!(loose, Cow::Borrowed(_)));

        let tight = fit_messages(&messages, 100_000, Some(95_000));
        assert_eq!(crate::total_chars(&tight), 20_000);
    }

    #[test]
    fn exact_deficit_stops_after_full_trim() {
        // Index 3 is exactly deficit + TRIM_TO_LEN long, so its full trim
        // closes the deficit and nothing else is touched.
        let messages = make_messages(&[
            (MessageRole::System, 10),
            (MessageRole::User, 10),
            (MessageRole::User, 3980),
            (MessageRole::Assistant, 2000),
            (MessageRole::User, 0),
            (MessageRole::Assistant, 0),
            (MessageRole::User, 0),
            (MessageRole::Assistant, 0),
        ]);
        let outcome = fit_with_report(&messages, &FitConfig::new(2000));

        assert_eq!(outcome.plan.deficit, 1000);
        assert_eq!(outcome.actions.len(), 1);
        assert_eq!(outcome.actions[0].index, 3);
        assert_eq!(outcome.actions[0].kind, TrimKind::Full);
        assert_eq!(outcome.stop_reason, StopReason::DeficitClosed);
        assert_eq!(outcome.final_chars, 5000);
        assert_eq!(outcome.messages[2], messages[2]);
    }

    #[test]
    fn short_messages_are_retired_not_grown() {
        // Ten 900-char messages: over the 5000-char floor but none longer
        // than the full-trim length.
        let messages: Vec<Message> = (0..10).map(|_| Message::user("z".repeat(900))).collect();
        let outcome = fit_with_report(&messages, &FitConfig::new(2000));

        assert_eq!(outcome.stop_reason, StopReason::NoCandidate);
        assert!(!outcome.within_budget());
        assert_eq!(outcome.overflow(), 4000);
        assert!(!outcome.was_trimmed());
        assert_eq!(outcome.actions.len(), 10);
        assert!(outcome.actions.iter().all(|a| a.kind == TrimKind::Skipped));
        assert_eq!(&outcome.messages[..], messages.as_slice());
    }

    #[test]
    fn iteration_cap_bounds_work() {
        let messages: Vec<Message> = (0..200).map(|_| Message::user("q".repeat(1500))).collect();
        let config = FitConfig::new(2000);
        let outcome = fit_with_report(&messages, &config);

        assert_eq!(outcome.stop_reason, StopReason::IterationCap);
        assert_eq!(outcome.iterations, MAX_ITERATIONS);
        assert_eq!(outcome.actions.len(), MAX_ITERATIONS);
        assert!(!outcome.within_budget());
    }

    #[test]
    fn configured_iteration_cap_is_respected() {
        let messages: Vec<Message> = (0..20).map(|_| Message::user("q".repeat(1500))).collect();
        let outcome = fit_with_report(&messages, &FitConfig::new(2000).with_max_iterations(3));
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.stop_reason, StopReason::IterationCap);
    }

    #[test]
    fn partial_trim_strips_whitespace_before_marker() {
        let mut content = "w".repeat(2990);
        content.push_str("          ");
        content.push_str(&"t".repeat(3000));
        let messages = vec![
            Message::system(""),
            Message::user(""),
            Message::user(content),
            Message::assistant(""),
            Message::user(""),
            Message::assistant(""),
            Message::user(""),
            Message::assistant(""),
        ];
        // 6000 chars, 5000 budget: keep 6000 - 1000 - 3 = 4997 chars, which
        // ends mid-way through the "t" run, so nothing to strip there.
        let outcome = fit_with_report(&messages, &FitConfig::new(2000));
        assert_eq!(outcome.messages[2].char_len(), 5000);

        // Land the cut inside the whitespace run instead.
        let config = FitConfig::new(2000).with_min_chars_to_preserve(2998);
        let outcome = fit_with_report(&messages, &config);
        let fitted = &outcome.messages[2].content;
        assert_eq!(fitted, &format!("{}...", "w".repeat(2990)));
        assert!(outcome.final_chars < 2998);
    }

    #[test]
    fn multibyte_content_is_cut_on_char_boundaries() {
        let messages = vec![
            Message::system(""),
            Message::user(""),
            Message::user(""),
            Message::assistant("é".repeat(6000)),
            Message::user(""),
            Message::assistant(""),
            Message::user(""),
            Message::assistant(""),
        ];
        let outcome = fit_with_report(&messages, &FitConfig::new(2000));
        assert_eq!(outcome.messages[3].char_len(), 5000);
        assert!(outcome.messages[3].content.ends_with("é..."));
    }

    #[test]
    fn marker_short_trim_length_never_grows_messages() {
        // Trimming to zero chars would still leave "...", which is longer
        // than a one-char message.
        let messages: Vec<Message> = (0..8).map(|_| Message::assistant("a")).collect();
        let config = FitConfig::new(2000)
            .with_trim_to_len(0)
            .with_min_chars_to_preserve(4);
        let outcome = fit_with_report(&messages, &config);

        assert_eq!(lengths(&outcome.messages), vec![1; 8]);
        assert_eq!(outcome.final_chars, 8);
        assert!(outcome.final_chars <= outcome.plan.total_chars);
        assert!(outcome.actions.iter().all(|a| a.kind == TrimKind::Skipped));
        assert_eq!(outcome.stop_reason, StopReason::NoCandidate);
    }

    #[test]
    fn marker_short_trim_length_cuts_down_to_marker() {
        let messages = make_messages(&[
            (MessageRole::System, 0),
            (MessageRole::User, 0),
            (MessageRole::User, 20),
            (MessageRole::Assistant, 20),
            (MessageRole::User, 0),
            (MessageRole::Assistant, 0),
            (MessageRole::User, 0),
            (MessageRole::Assistant, 0),
        ]);
        let config = FitConfig::new(2000)
            .with_trim_to_len(1)
            .with_min_chars_to_preserve(5);
        let outcome = fit_with_report(&messages, &config);

        // Deficit 35: two full trims save 17 each, leaving one char over.
        assert_eq!(outcome.plan.deficit, 35);
        assert_eq!(outcome.actions.len(), 2);
        assert!(
            outcome
                .actions
                .iter()
                .all(|a| a.kind == TrimKind::Full && a.chars_after == ELLIPSIS.len())
        );
        assert_eq!(outcome.messages[3].content, ELLIPSIS);
        assert_eq!(outcome.final_chars, 6);
        assert_eq!(outcome.overflow(), 1);
        assert_eq!(outcome.stop_reason, StopReason::NoCandidate);
    }

    #[test]
    fn shorten_handles_keep_beyond_length() {
        assert_eq!(shorten("abc", 10, false), "abc...");
        assert_eq!(shorten("  abc  ", 10, true), "abc...");
        assert_eq!(shorten("abcdef", 2, false), "ab...");
    }

    #[test]
    fn log_string_summarises_actions() {
        let messages = scenario();
        let outcome = fit_with_report(&messages, &FitConfig::new(2000));
        let log = outcome.to_log_string();
        assert!(log.contains("8300 -> 5000 chars"));
        assert!(log.contains("1 full / 1 partial"));
    }

    #[test]
    fn into_messages_owns_result() {
        let messages = scenario();
        let owned = fit_with_report(&messages, &FitConfig::new(2000)).into_messages();
        assert_eq!(owned.len(), messages.len());
    }
}
