// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; nothing is collected unless the embedding
//! application installs a recorder.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use simplemem_core::{CapabilityError, CapabilityKind, ViewKind};

/// Register all SimpleMem metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("simplemem_turns_buffered_total", "Dialogue turns accepted into the buffer");
    describe_counter!("simplemem_turns_filtered_total", "Turns dropped by the quality filter");
    describe_counter!("simplemem_facts_created_total", "New atomic facts stored");
    describe_counter!("simplemem_facts_updated_total", "Fact corrections stored as new versions");
    describe_counter!(
        "simplemem_facts_unresolved_total",
        "Stored facts flagged as unresolved"
    );
    describe_counter!(
        "simplemem_windows_deferred_total",
        "Windows returned to the buffer after compression failed"
    );
    describe_counter!(
        "simplemem_windows_dropped_total",
        "Windows discarded after a permanent compression or embedding failure"
    );
    describe_counter!("simplemem_capability_retries_total", "Capability call retries");
    describe_counter!(
        "simplemem_capability_failures_total",
        "Capability calls that failed after retries"
    );
    describe_counter!(
        "simplemem_retrievals_partial_total",
        "Queries answered with at least one view unavailable"
    );
    describe_counter!(
        "simplemem_index_violations_total",
        "Facts quarantined after a cross-view consistency violation"
    );
    describe_gauge!("simplemem_buffered_turns", "Turns currently awaiting compression");
    describe_histogram!(
        "simplemem_retrieval_latency_seconds",
        "End-to-end query latency in seconds"
    );
    describe_histogram!(
        "simplemem_finalize_latency_seconds",
        "Finalize latency in seconds"
    );
}

pub fn record_turns_buffered(count: usize) {
    metrics::counter!("simplemem_turns_buffered_total").increment(count as u64);
}

pub fn set_buffered_turns(count: usize) {
    metrics::gauge!("simplemem_buffered_turns").set(count as f64);
}

pub fn record_turns_filtered(count: usize) {
    metrics::counter!("simplemem_turns_filtered_total").increment(count as u64);
}

/// Record the fact counts of one finalize call.
pub fn record_facts(created: usize, updated: usize, unresolved: usize) {
    metrics::counter!("simplemem_facts_created_total").increment(created as u64);
    metrics::counter!("simplemem_facts_updated_total").increment(updated as u64);
    metrics::counter!("simplemem_facts_unresolved_total").increment(unresolved as u64);
}

pub fn record_window_deferred() {
    metrics::counter!("simplemem_windows_deferred_total").increment(1);
}

pub fn record_window_dropped() {
    metrics::counter!("simplemem_windows_dropped_total").increment(1);
}

pub fn record_capability_retry(capability: CapabilityKind) {
    metrics::counter!("simplemem_capability_retries_total", "capability" => capability.to_string())
        .increment(1);
}

pub fn record_capability_failure(capability: CapabilityKind, error: &CapabilityError) {
    let reason = match error {
        CapabilityError::Timeout { .. } => "timeout",
        CapabilityError::Unavailable { .. } => "unavailable",
        CapabilityError::InvalidResponse { .. } => "invalid_response",
    };
    metrics::counter!(
        "simplemem_capability_failures_total",
        "capability" => capability.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_partial_retrieval(unavailable: &[ViewKind]) {
    for view in unavailable {
        metrics::counter!("simplemem_retrievals_partial_total", "view" => view.to_string())
            .increment(1);
    }
}

pub fn record_index_violation() {
    metrics::counter!("simplemem_index_violations_total").increment(1);
}

pub fn record_retrieval_latency(seconds: f64) {
    metrics::histogram!("simplemem_retrieval_latency_seconds").record(seconds);
}

pub fn record_finalize_latency(seconds: f64) {
    metrics::histogram!("simplemem_finalize_latency_seconds").record(seconds);
}
