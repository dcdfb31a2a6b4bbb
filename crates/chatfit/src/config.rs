//! Fitting configuration with defaults matching the stock budget rules.
//!
//! [`FitConfig`] carries the capacity of the target model plus the constants
//! the fitting loop uses. The defaults reproduce the standard behaviour
//! exactly; override individual values with the `with_*` builder methods or
//! load them from a JSON file.
//!
//! # Examples
//!
//! ```
//! use chatfit::FitConfig;
//!
//! let config = FitConfig::new(32_000).with_output_reservation(8192);
//! assert_eq!(config.effective_reservation(), 8192);
//! ```
//!
//! A JSON config file only needs the fields it changes:
//!
//! ```json
//! { "context_window": 32000, "output_reservation": 8192 }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::budget::{CHARS_PER_TOKEN, DEFAULT_OUTPUT_RESERVATION, MIN_CHARS_TO_PRESERVE};
use crate::context::fit::{ELLIPSIS, MAX_ITERATIONS, TRIM_TO_LEN};
use crate::error::{Error, Result};

/// Default context window in tokens when none is configured.
pub const DEFAULT_CONTEXT_WINDOW: u32 = 128_000;

/// Capacity and tuning for one fitting call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Model context window in tokens. Default: `128_000`.
    pub context_window: u32,
    /// Explicit output reservation in tokens. When `None`,
    /// `default_reservation` is used.
    pub output_reservation: Option<u32>,
    /// Reservation used when `output_reservation` is unset. Default: `4096`.
    pub default_reservation: u32,
    /// Characters per token. Default: `4`.
    pub chars_per_token: u32,
    /// Length a fully trimmed message is cut to, marker included. Default: `1000`.
    pub trim_to_len: usize,
    /// Floor for the character budget. Default: `5000`.
    pub min_chars_to_preserve: usize,
    /// Upper bound on selection/trim rounds. Default: `100`.
    pub max_iterations: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_CONTEXT_WINDOW,
            output_reservation: None,
            default_reservation: DEFAULT_OUTPUT_RESERVATION,
            chars_per_token: CHARS_PER_TOKEN,
            trim_to_len: TRIM_TO_LEN,
            min_chars_to_preserve: MIN_CHARS_TO_PRESERVE,
            max_iterations: MAX_ITERATIONS,
        }
    }
}

impl FitConfig {
    /// Create a config for the given context window with all other values
    /// at their defaults.
    pub fn new(context_window: u32) -> Self {
        Self {
            context_window,
            ..Self::default()
        }
    }

    /// Reserve `tokens` for the model's output.
    pub fn with_output_reservation(mut self, tokens: u32) -> Self {
        self.output_reservation = Some(tokens);
        self
    }

    /// Set or clear the explicit output reservation.
    pub fn with_optional_reservation(mut self, tokens: Option<u32>) -> Self {
        self.output_reservation = tokens;
        self
    }

    /// Override the fallback reservation used when none is set explicitly.
    pub fn with_default_reservation(mut self, tokens: u32) -> Self {
        self.default_reservation = tokens;
        self
    }

    /// Override the characters-per-token ratio.
    pub fn with_chars_per_token(mut self, ratio: u32) -> Self {
        self.chars_per_token = ratio;
        self
    }

    /// Override the full-trim length.
    pub fn with_trim_to_len(mut self, chars: usize) -> Self {
        self.trim_to_len = chars;
        self
    }

    /// Override the character budget floor.
    pub fn with_min_chars_to_preserve(mut self, chars: usize) -> Self {
        self.min_chars_to_preserve = chars;
        self
    }

    /// Override the iteration bound.
    pub fn with_max_iterations(mut self, rounds: usize) -> Self {
        self.max_iterations = rounds;
        self
    }

    /// The reservation actually applied before the half-window rule.
    pub fn effective_reservation(&self) -> u32 {
        self.output_reservation.unwrap_or(self.default_reservation)
    }

    /// Reject settings that cannot describe a real model.
    pub fn validate(&self) -> Result<()> {
        if self.context_window == 0 {
            return Err(Error::InvalidConfig(
                "context_window must be greater than zero".into(),
            ));
        }
        if self.chars_per_token == 0 {
            return Err(Error::InvalidConfig(
                "chars_per_token must be greater than zero".into(),
            ));
        }
        if self.trim_to_len < ELLIPSIS.len() {
            return Err(Error::InvalidConfig(format!(
                "trim_to_len must be at least {} to hold the \"{ELLIPSIS}\" marker (got {})",
                ELLIPSIS.len(),
                self.trim_to_len,
            )));
        }
        Ok(())
    }

    /// Parse and validate a config from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }
}
