// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as positive window sizes and probability-valued thresholds.

use crate::diagnostic::ConfigError;
use crate::model::SimpleMemConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &SimpleMemConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let level = config.system.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        fail(format!(
            "system.log_level `{}` must be one of {}",
            config.system.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.buffer.window_size == 0 {
        fail("buffer.window_size must be at least 1".to_string());
    }

    let threshold = config.compression.quality_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        fail(format!(
            "compression.quality_threshold must be within [0, 1], got {threshold}"
        ));
    }

    if config.compression.max_parallel_windows == 0 {
        fail("compression.max_parallel_windows must be at least 1".to_string());
    }

    if config
        .compression
        .deictic_terms
        .iter()
        .any(|t| t.trim().is_empty() || t.contains(char::is_whitespace))
    {
        fail("compression.deictic_terms must be single non-empty words".to_string());
    }

    if config.index.bm25_k1 < 0.0 {
        fail(format!(
            "index.bm25_k1 must be non-negative, got {}",
            config.index.bm25_k1
        ));
    }

    if !(0.0..=1.0).contains(&config.index.bm25_b) {
        fail(format!(
            "index.bm25_b must be within [0, 1], got {}",
            config.index.bm25_b
        ));
    }

    if config.index.embedding_dimensions == 0 {
        fail("index.embedding_dimensions must be at least 1".to_string());
    }

    if config.retrieval.k_base == 0 {
        fail("retrieval.k_base must be at least 1".to_string());
    }

    if config.retrieval.delta < 0.0 {
        fail(format!(
            "retrieval.delta must be non-negative, got {}",
            config.retrieval.delta
        ));
    }

    if config.retrieval.rrf_c <= 0.0 {
        fail(format!(
            "retrieval.rrf_c must be positive, got {}",
            config.retrieval.rrf_c
        ));
    }

    let caps = &config.capabilities;
    if caps.timeout_ms == 0 {
        fail("capabilities.timeout_ms must be at least 1".to_string());
    }
    if caps.max_attempts == 0 {
        fail("capabilities.max_attempts must be at least 1".to_string());
    }
    if caps.backoff_multiplier < 1.0 {
        fail(format!(
            "capabilities.backoff_multiplier must be at least 1.0, got {}",
            caps.backoff_multiplier
        ));
    }
    if caps.max_backoff_ms < caps.initial_backoff_ms {
        fail(format!(
            "capabilities.max_backoff_ms ({}) must not be less than initial_backoff_ms ({})",
            caps.max_backoff_ms, caps.initial_backoff_ms
        ));
    }

    if config.openai.base_url.trim().is_empty() {
        fail("openai.base_url must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
