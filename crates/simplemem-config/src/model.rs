// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the SimpleMem memory pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level SimpleMem configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SimpleMemConfig {
    /// Process-level settings.
    #[serde(default)]
    pub system: SystemConfig,

    /// Fact store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Dialogue buffer settings.
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Semantic compression settings.
    #[serde(default)]
    pub compression: CompressionConfig,

    /// Multi-view index settings.
    #[serde(default)]
    pub index: IndexConfig,

    /// Adaptive retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Timeout and retry policy for external capabilities.
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,

    /// OpenAI-compatible endpoint backing the capabilities.
    #[serde(default)]
    pub openai: OpenAiConfig,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Fact store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("simplemem").join("simplemem.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("simplemem.db"))
        .display()
        .to_string()
}

fn default_true() -> bool {
    true
}

/// Dialogue buffer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BufferConfig {
    /// Number of turns per compression window.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
        }
    }
}

fn default_window_size() -> usize {
    40
}

/// Semantic compression configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CompressionConfig {
    /// Turns whose information score falls below this are dropped before extraction.
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f32,

    /// Tokens that mark canonical text as context dependent if they survive resolution.
    #[serde(default = "default_deictic_terms")]
    pub deictic_terms: Vec<String>,

    /// Maximum number of windows compressed concurrently.
    #[serde(default = "default_max_parallel_windows")]
    pub max_parallel_windows: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            quality_threshold: default_quality_threshold(),
            deictic_terms: default_deictic_terms(),
            max_parallel_windows: default_max_parallel_windows(),
        }
    }
}

fn default_quality_threshold() -> f32 {
    0.1
}

fn default_deictic_terms() -> Vec<String> {
    [
        "i", "me", "my", "mine", "we", "us", "our", "ours", "you", "your", "yours", "he", "she",
        "him", "her", "his", "hers", "they", "them", "their", "theirs", "here", "there", "now",
        "tomorrow", "yesterday", "today", "tonight",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_parallel_windows() -> usize {
    4
}

/// Multi-view index configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// BM25 term-frequency saturation.
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f64,

    /// BM25 length normalization.
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f64,

    /// Dimension of vectors accepted by the semantic view.
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            embedding_dimensions: default_embedding_dimensions(),
        }
    }
}

fn default_bm25_k1() -> f64 {
    1.2
}

fn default_bm25_b() -> f64 {
    0.75
}

fn default_embedding_dimensions() -> usize {
    1024
}

/// Adaptive retrieval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Facts returned per query.
    #[serde(default = "default_k_base")]
    pub k_base: usize,

    /// Scale of the complexity-driven depth increase.
    #[serde(default = "default_delta")]
    pub delta: f64,

    /// Reciprocal-rank-fusion smoothing constant.
    #[serde(default = "default_rrf_c")]
    pub rrf_c: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k_base: default_k_base(),
            delta: default_delta(),
            rrf_c: default_rrf_c(),
        }
    }
}

fn default_k_base() -> usize {
    5
}

fn default_delta() -> f64 {
    0.5
}

fn default_rrf_c() -> f64 {
    60.0
}

/// Timeout and retry policy applied to every capability call.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilitiesConfig {
    /// Deadline for a single attempt, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Total attempts including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound on any single retry delay, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Factor applied to the delay after each retry.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// OpenAI-compatible endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// API base URL (without trailing `/chat/completions`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key. `None` falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for filtering, extraction, and complexity estimation.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Model used for embeddings.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Sampling temperature for chat completions.
    #[serde(default)]
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            temperature: 0.0,
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
