//! # Cairn CLI Module
//!
//! This module implements the CLI interface for Cairn.
//!
//! ## Available Commands
//!
//! - `init` - Create a data directory with empty logs and a default config
//! - `promote` - Promote retrieval hits into Knowledge Units
//! - `reason` - Build Reasoning Units over the promoted corpus
//! - `verify` - Strict-order, referential-integrity and content-address checks
//! - `status` - Corpus metrics and the latest run metadata
//! - `show` - Print one record by id
//! - `ids` - List ids in log order (a strict-order baseline)
//! - `export` - Export the graph as JSON or Graphviz DOT
//! - `reindex` - Rebuild both offset indexes from the logs
//! - `hash` - BLAKE3 of each log and of the canonical graph

mod commands;

use crate::config::{CairnConfig, DataDir, env_lookup, resolve_data_dir};
use cairn_core::CairnError;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Cairn - citation-locked knowledge promotion and reasoning
///
/// Turns ranked retrieval hits into immutable Knowledge Units and relates them
/// with typed, bounded, reproducible Reasoning Units.
#[derive(Parser, Debug)]
#[command(name = "cairn")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (debug logging unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Data directory (default: $CAIRN_DATA_DIR, then .cairn)
    #[arg(short = 'D', long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Config file (default: <data-dir>/cairn.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Graph export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Dot,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a data directory
    Init {
        /// Overwrite an existing cairn.toml with the defaults
        #[arg(short, long)]
        force: bool,
    },

    /// Promote retrieval hits into Knowledge Units
    Promote {
        /// Hits file: a JSON array or JSON lines of {chunkText, sourceMetadata, rankScore, rank?}
        #[arg(short = 'i', long)]
        hits: PathBuf,

        /// Query that produced the hits
        #[arg(short, long)]
        query: String,

        /// Report what would be promoted without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Build Reasoning Units over the promoted corpus
    Reason {
        /// Maximum edges emitted per anchor (overrides config and CAIRN_TOP_K)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Topic label recorded on emitted units
        #[arg(short, long)]
        topic: Option<String>,

        /// Report what would be emitted without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Verify log integrity
    Verify {
        /// Expected Knowledge Unit id sequence, one id per line
        #[arg(long)]
        expect_knowledge: Option<PathBuf>,

        /// Expected Reasoning Unit id sequence, one id per line
        #[arg(long)]
        expect_reasoning: Option<PathBuf>,
    },

    /// Show corpus metrics and the latest run metadata
    Status,

    /// Print one Knowledge Unit (ku_...) or Reasoning Unit (ru_...)
    Show {
        /// Record id
        id: String,
    },

    /// List ids in log order
    Ids {
        /// List Reasoning Unit ids instead of Knowledge Unit ids
        #[arg(short, long)]
        reasoning: bool,
    },

    /// Export the graph
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format
        #[arg(short = 't', long, value_enum, default_value = "json")]
        format: ExportFormat,
    },

    /// Rebuild both offset indexes from the logs
    Reindex,

    /// Compute BLAKE3 hashes of the logs and the canonical graph
    Hash,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Resolved runtime context shared by all commands.
#[derive(Debug, Clone)]
pub struct Context {
    pub data: DataDir,
    pub config: CairnConfig,
    pub config_path: PathBuf,
    pub json_mode: bool,
}

impl Context {
    /// Resolve data directory and configuration from flags and environment.
    pub fn resolve(cli: &Cli) -> Result<Self, CairnError> {
        let data = DataDir::new(resolve_data_dir(cli.data_dir.as_deref(), env_lookup));
        let config_path = cli.config.clone().unwrap_or_else(|| data.config_file());
        let mut config = CairnConfig::load(&config_path)?;
        config.apply_env(env_lookup)?;
        Ok(Self {
            data,
            config,
            config_path,
            json_mode: cli.json_mode,
        })
    }
}

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), CairnError> {
    let ctx = Context::resolve(&cli)?;

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Promote {
            hits,
            query,
            dry_run,
        }) => cmd_promote(&ctx, &hits, &query, dry_run),
        Some(Commands::Reason {
            top_k,
            topic,
            dry_run,
        }) => cmd_reason(&ctx, top_k, topic, dry_run),
        Some(Commands::Verify {
            expect_knowledge,
            expect_reasoning,
        }) => cmd_verify(&ctx, expect_knowledge.as_deref(), expect_reasoning.as_deref()),
        Some(Commands::Status) => cmd_status(&ctx),
        Some(Commands::Show { id }) => cmd_show(&ctx, &id),
        Some(Commands::Ids { reasoning }) => cmd_ids(&ctx, reasoning),
        Some(Commands::Export { output, format }) => cmd_export(&ctx, &output, format),
        Some(Commands::Reindex) => cmd_reindex(&ctx),
        Some(Commands::Hash) => cmd_hash(&ctx),
        None => {
            // No subcommand - show status by default
            cmd_status(&ctx)
        }
    }
}
