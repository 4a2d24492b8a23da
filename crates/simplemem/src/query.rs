// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only commands: `ask`, `facts` and `stats`.

use std::process::ExitCode;

use serde::Serialize;
use simplemem_core::types::TIMESTAMP_FORMAT;
use simplemem_core::{AtomicFact, FactId, Query, SimpleMemError};
use simplemem_memory::MemorySystem;

fn print_json<T: Serialize>(value: &T) -> Result<(), SimpleMemError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| SimpleMemError::Internal(format!("failed to render JSON: {e}")))?;
    println!("{rendered}");
    Ok(())
}

pub async fn run_ask(
    system: &MemorySystem,
    text: &str,
    k_base: Option<usize>,
    depth: Option<usize>,
    json: bool,
) -> Result<ExitCode, SimpleMemError> {
    let k_base = k_base.unwrap_or(system.config().retrieval.k_base);
    let mut query = Query::new(text, k_base);
    if let Some(depth) = depth {
        query = query.with_depth(depth);
    }
    let result = system.ask_query(query).await?;

    if json {
        print_json(&result)?;
    } else {
        print!("{}", result.render_context());
        if result.is_partial() {
            eprintln!(
                "simplemem: partial result, unavailable views: {:?}",
                result.unavailable_views
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn run_list_facts(
    system: &MemorySystem,
    limit: Option<usize>,
    offset: usize,
    json: bool,
) -> Result<ExitCode, SimpleMemError> {
    let facts = system.list_facts(limit, offset).await?;
    if json {
        print_json(&facts)?;
    } else if facts.is_empty() {
        println!("no facts stored");
    } else {
        for fact in &facts {
            println!("{}", fact_line(fact));
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct FactDetail {
    fact: AtomicFact,
    versions: Vec<u64>,
}

pub async fn run_show_fact(
    system: &MemorySystem,
    id: String,
    json: bool,
) -> Result<ExitCode, SimpleMemError> {
    let id = FactId(id);
    let Some(fact) = system.get_fact(&id).await? else {
        eprintln!("simplemem: no fact with id {id}");
        return Ok(ExitCode::FAILURE);
    };
    let versions = system.fact_versions(&id).await?;

    if json {
        print_json(&FactDetail { fact, versions })?;
        return Ok(ExitCode::SUCCESS);
    }
    println!("{}", fact_line(&fact));
    println!("  speakers:   {}", fact.speakers.join(", "));
    println!("  entities:   {}", fact.entities.join(", "));
    println!("  keywords:   {}", fact.keywords.join(", "));
    println!("  turns:      {}", fact.source_turns);
    println!("  observed:   {}", fact.observed_at.format(TIMESTAMP_FORMAT));
    if let Some(time) = fact.time {
        match time.end {
            Some(end) => println!(
                "  time:       {} .. {}",
                time.start.format(TIMESTAMP_FORMAT),
                end.format(TIMESTAMP_FORMAT)
            ),
            None => println!("  time:       {}", time.start.format(TIMESTAMP_FORMAT)),
        }
    }
    if !fact.unresolved_references.is_empty() {
        println!("  unresolved: {}", fact.unresolved_references.join(", "));
    }
    if let Some(key) = &fact.correlation_key {
        println!("  correlates: {key}");
    }
    println!(
        "  versions:   {}",
        versions
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(ExitCode::SUCCESS)
}

pub async fn run_stats(system: &MemorySystem, json: bool) -> Result<ExitCode, SimpleMemError> {
    let stats = system.stats().await?;
    if json {
        print_json(&stats)?;
        return Ok(ExitCode::SUCCESS);
    }
    println!("database:          {}", stats.database_path);
    println!("facts stored:      {}", stats.total_facts_stored);
    println!("facts indexed:     {}", stats.indexed_facts);
    println!("facts quarantined: {}", stats.quarantined_facts);
    println!("turns processed:   {}", stats.total_turns_processed);
    match stats.last_finalized_at {
        Some(at) => println!("last finalized:    {}", at.to_rfc3339()),
        None => println!("last finalized:    never"),
    }
    Ok(ExitCode::SUCCESS)
}

/// One-line summary: id, version, resolution marker and canonical text.
fn fact_line(fact: &AtomicFact) -> String {
    let marker = if fact.is_unresolved() { " (unresolved)" } else { "" };
    format!("{} v{}{}: {}", fact.id, fact.version, marker, fact.text)
}
