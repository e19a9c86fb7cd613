//! # Cairn
//!
//! The binary for citation-locked knowledge promotion and reasoning.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │             apps/cairn (THE BINARY)           │
//! │                                               │
//! │   ┌─────────────┐        ┌────────────────┐   │
//! │   │    CLI      │        │  Config + Data │   │
//! │   │   (clap)    │        │  dir (toml)    │   │
//! │   └──────┬──────┘        └───────┬────────┘   │
//! │          └───────────┬───────────┘            │
//! │                      ▼                        │
//! │              ┌───────────────┐                │
//! │              │  cairn-core   │                │
//! │              │  (THE LOGIC)  │                │
//! │              └───────────────┘                │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! cairn init
//! cairn promote -i hits.jsonl -q "working memory capacity"
//! cairn reason -k 5
//! cairn verify
//! ```
//!
//! Exit status is 0 on success, 2 on an integrity failure (a corrupt log, a
//! collision, a dangling reference, an order violation) and 1 otherwise.

use cairn::cli;
use cairn::config::ENV_LOG_FORMAT;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // CAIRN_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var(ENV_LOG_FORMAT).unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "cairn=debug,cairn_core=debug"
    } else {
        "cairn=info,cairn_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Logs go to stderr; stdout carries command output.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(if e.is_integrity() { 2 } else { 1 });
    }
}
