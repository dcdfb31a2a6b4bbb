//! Convenience re-exports for common `chatfit` types.
//!
//! ```
//! use chatfit::prelude::*;
//! ```
//!
//! Pulls in the message types, the config, and the two fitting entry
//! points. The individual pipeline stages (weights, selection) are left
//! out; import those from [`crate::context`] when needed.

pub use crate::config::FitConfig;
pub use crate::context::{BudgetPlan, FitOutcome, StopReason, fit_messages, fit_with_report};
pub use crate::{Message, MessageRole};
