// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SimpleMem - lifelong conversational memory.
//!
//! This is the binary entry point: it loads configuration, wires the
//! OpenAI-compatible capabilities into a `MemorySystem`, and runs one
//! subcommand against the configured database.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod doctor;
mod ingest;
mod query;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use simplemem_config::SimpleMemConfig;
use simplemem_core::SimpleMemError;
use simplemem_memory::{Capabilities, MemorySystem};
use simplemem_openai::OpenAiCapabilities;

/// SimpleMem - compress dialogue into atomic facts and retrieve them.
#[derive(Parser, Debug)]
#[command(name = "simplemem", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Buffer turns from a JSONL (or JSON array) file and finalize them into facts.
    Ingest {
        /// File of `{"speaker", "content", "timestamp"}` objects; `-` reads stdin.
        path: PathBuf,
        /// Print the finalize summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Retrieve the facts most relevant to a question.
    Ask {
        query: String,
        /// Facts to return (defaults to `retrieval.k_base`).
        #[arg(short = 'k', long)]
        k_base: Option<usize>,
        /// Per-view search depth, bypassing complexity estimation.
        #[arg(long)]
        depth: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// List stored facts, or show one fact with its version history.
    Facts {
        /// Show only this fact.
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        json: bool,
    },
    /// Show memory counters.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Delete every stored fact.
    Clear {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
    /// Check capability health and verify index consistency.
    Doctor,
    /// Print the effective configuration (API key redacted).
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => simplemem_config::load_and_validate_path(path),
        None => simplemem_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            simplemem_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.system.log_level);
    simplemem_memory::metrics::register_metrics();

    match run(cli.command, config).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("simplemem: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: SimpleMemConfig) -> Result<ExitCode, SimpleMemError> {
    if let Commands::Config = command {
        print_config(config)?;
        return Ok(ExitCode::SUCCESS);
    }
    if let Commands::Clear { yes: false } = command {
        eprintln!(
            "simplemem: this deletes every fact in {}; re-run with --yes",
            config.storage.database_path
        );
        return Ok(ExitCode::FAILURE);
    }

    let system = open_system(config).await?;
    match command {
        Commands::Ingest { path, json } => ingest::run_ingest(&system, &path, json).await,
        Commands::Ask {
            query,
            k_base,
            depth,
            json,
        } => query::run_ask(&system, &query, k_base, depth, json).await,
        Commands::Facts {
            id,
            limit,
            offset,
            json,
        } => match id {
            Some(id) => query::run_show_fact(&system, id, json).await,
            None => query::run_list_facts(&system, limit, offset, json).await,
        },
        Commands::Stats { json } => query::run_stats(&system, json).await,
        Commands::Clear { .. } => {
            system.clear().await?;
            println!("memory cleared");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Doctor => Ok(doctor::run_doctor(&system).await),
        Commands::Config => Ok(ExitCode::SUCCESS),
    }
}

async fn open_system(config: SimpleMemConfig) -> Result<MemorySystem, SimpleMemError> {
    let openai = OpenAiCapabilities::from_config(&config)?;
    let capabilities = Capabilities {
        quality_filter: openai.quality_filter,
        extractor: openai.extractor,
        embedder: openai.embedder,
        complexity: openai.complexity,
    };
    MemorySystem::open(config, capabilities).await
}

fn print_config(mut config: SimpleMemConfig) -> Result<(), SimpleMemError> {
    if config.openai.api_key.is_some() {
        config.openai.api_key = Some("<redacted>".into());
    }
    let rendered = toml::to_string_pretty(&config)
        .map_err(|e| SimpleMemError::Internal(format!("failed to render config: {e}")))?;
    print!("{rendered}");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "simplemem={log_level},simplemem_memory={log_level},simplemem_openai={log_level},warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
