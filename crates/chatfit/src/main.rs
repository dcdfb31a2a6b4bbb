//! Fit a JSON conversation into a context window and print the result.
//!
//! Reads a JSON array of `{"role", "content"}` messages from a file or
//! stdin, trims it to fit, and writes the fitted array to stdout. Reports
//! and logs go to stderr.
//!
//! # Examples
//!
//! ```sh
//! # Fit a conversation for an 8k-token model
//! chatfit --input history.json --context-window 8192
//!
//! # Pipe from stdin, reserve 2k tokens for output, show what was trimmed
//! cat history.json | chatfit --context-window 8192 --reserve 2048 --report
//!
//! # See which messages would be trimmed first
//! chatfit --input history.json --context-window 8192 --explain > /dev/null
//!
//! # Let a caller reject over-budget results (exit code 2)
//! chatfit --input history.json --context-window 4096 --fail-over-budget
//! ```

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use chatfit::context::{FitOutcome, TrimSet, fit_with_report, rank};
use chatfit::{Error, FitConfig, Message};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Exit code used by `--fail-over-budget` when the result is still too large.
const EXIT_OVER_BUDGET: i32 = 2;

/// Name used in errors when the conversation comes from stdin.
const STDIN_NAME: &str = "<stdin>";

/// Fit a chat conversation into a model's context window.
///
/// Reads a JSON array of messages from --input or stdin and prints the
/// fitted array to stdout.
#[derive(Parser)]
#[command(name = "chatfit", version)]
struct Cli {
    // ── Input ──────────────────────────────────────────────────
    /// JSON file holding the message array (default: stdin)
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    // ── Capacity ───────────────────────────────────────────────
    /// Model context window in tokens
    #[arg(long, short = 'w')]
    context_window: Option<u32>,

    /// Tokens to reserve for the model's output (default 4096, never less
    /// than half the window)
    #[arg(long)]
    reserve: Option<u32>,

    // ── Output ─────────────────────────────────────────────────
    /// Pretty-print the fitted JSON
    #[arg(long)]
    pretty: bool,

    /// Print a fit report to stderr
    #[arg(long)]
    report: bool,

    /// Print the initial trim ranking to stderr
    #[arg(long)]
    explain: bool,

    /// Exit with status 2 if the result is still over budget
    #[arg(long)]
    fail_over_budget: bool,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ── Helpers ────────────────────────────────────────────────────────

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn build_config(cli: &Cli) -> Result<FitConfig, String> {
    let mut config = match &cli.config {
        Some(path) => FitConfig::from_json_file(path).map_err(|e| e.to_string())?,
        None => FitConfig::default(),
    };

    if let Some(window) = cli.context_window {
        config.context_window = window;
    }
    if let Some(tokens) = cli.reserve {
        config.output_reservation = Some(tokens);
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn read_input(path: Option<&Path>) -> chatfit::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|source| Error::Io {
                    path: PathBuf::from(STDIN_NAME),
                    source,
                })?;
            Ok(buf)
        }
    }
}

fn parse_messages(json: &str) -> chatfit::Result<Vec<Message>> {
    Ok(serde_json::from_str(json)?)
}

fn print_ranking(messages: &[Message]) {
    eprintln!("  trim ranking (most eager first):");
    for entry in rank(messages, &TrimSet::new()) {
        eprintln!(
            "  #{:<4} {:<9} {:>8} chars  weight {:>12.2}",
            entry.index,
            entry.message.role,
            entry.message.char_len(),
            entry.weight,
        );
    }
}

fn print_report(outcome: &FitOutcome<'_>) {
    eprintln!("  {}", outcome.plan.to_log_string());
    for action in &outcome.actions {
        eprintln!(
            "  [{:?}] #{} {}: {} -> {} chars",
            action.kind, action.index, action.role, action.chars_before, action.chars_after,
        );
    }
    eprintln!("  {}", outcome.to_log_string());
    if !outcome.within_budget() {
        eprintln!("  over budget by {} chars", outcome.overflow());
    }
}

fn run(cli: &Cli) -> Result<i32, String> {
    let config = build_config(cli)?;
    let input = read_input(cli.input.as_deref()).map_err(|e| e.to_string())?;
    let messages =
        parse_messages(&input).map_err(|e| format!("failed to parse messages: {e}"))?;

    if cli.explain {
        print_ranking(&messages);
    }

    let outcome = fit_with_report(&messages, &config);

    if cli.report {
        print_report(&outcome);
    }

    let json = if cli.pretty {
        serde_json::to_string_pretty(&*outcome.messages)
    } else {
        serde_json::to_string(&*outcome.messages)
    }
    .map_err(|e| format!("failed to serialize messages: {e}"))?;
    println!("{json}");

    if cli.fail_over_budget && !outcome.within_budget() {
        return Ok(EXIT_OVER_BUDGET);
    }
    Ok(0)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
