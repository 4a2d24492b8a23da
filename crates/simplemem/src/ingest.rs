// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `simplemem ingest` command implementation.
//!
//! Reads dialogue turns from a file, buffers them as one all-or-nothing
//! batch, and finalizes. The buffer does not outlive the process, so
//! deferred windows are reported and the command fails.

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

use simplemem_core::{FinalizeSummary, SimpleMemError, TurnInput};
use simplemem_memory::MemorySystem;
use tracing::info;

/// Parse turns from JSONL, or from a JSON array when the input starts with `[`.
pub fn parse_turns(input: &str) -> Result<Vec<TurnInput>, SimpleMemError> {
    if input.trim_start().starts_with('[') {
        return serde_json::from_str(input)
            .map_err(|e| SimpleMemError::Config(format!("invalid turn array: {e}")));
    }
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .map_err(|e| SimpleMemError::Config(format!("line {}: invalid turn: {e}", n + 1)))
        })
        .collect()
}

fn read_input(path: &Path) -> Result<String, SimpleMemError> {
    let read = if path == Path::new("-") {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input).map(|_| input)
    } else {
        std::fs::read_to_string(path)
    };
    read.map_err(|e| SimpleMemError::Storage {
        source: Box::new(e),
    })
}

pub async fn run_ingest(
    system: &MemorySystem,
    path: &Path,
    json: bool,
) -> Result<ExitCode, SimpleMemError> {
    let turns = parse_turns(&read_input(path)?)?;
    if turns.is_empty() {
        eprintln!("simplemem: {} contains no turns", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let ids = system.add_turns_batch(turns).await?;
    info!(turns = ids.len(), "turns buffered");
    let summary = system.finalize().await?;

    if json {
        let rendered = serde_json::to_string_pretty(&summary)
            .map_err(|e| SimpleMemError::Internal(format!("failed to render summary: {e}")))?;
        println!("{rendered}");
    } else {
        print_summary(&summary);
    }

    if summary.windows_deferred > 0 {
        eprintln!(
            "simplemem: {} window(s) could not be compressed and were not stored; re-run ingest once the endpoint is reachable",
            summary.windows_deferred
        );
        return Ok(ExitCode::FAILURE);
    }
    if summary.windows_dropped > 0 {
        eprintln!(
            "simplemem: {} window(s) were rejected by a capability and discarded",
            summary.windows_dropped
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &FinalizeSummary) {
    println!(
        "facts: {} created, {} updated, {} unresolved",
        summary.facts_created, summary.facts_updated, summary.facts_unresolved
    );
    let c = &summary.compression;
    println!(
        "windows: {} processed, {} deferred, {} dropped; turns: {} seen, {} filtered; tokens: {} -> {}",
        summary.windows_processed,
        summary.windows_deferred,
        summary.windows_dropped,
        c.turns_seen,
        c.turns_filtered,
        c.source_tokens,
        c.canonical_tokens
    );
    for err in &summary.errors {
        match err.turns {
            Some(turns) => println!("  [{}] turns {turns}: {}", err.kind, err.message),
            None => println!("  [{}] {}", err.kind, err.message),
        }
    }
}
