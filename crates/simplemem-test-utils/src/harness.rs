// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete `MemorySystem` over the deterministic
//! capabilities in [`crate::capabilities`], backed by either an in-memory
//! database or a SQLite file in a temp directory.

use std::sync::Arc;

use simplemem_config::SimpleMemConfig;
use simplemem_config::model::{BufferConfig, CapabilitiesConfig, IndexConfig, StorageConfig};
use simplemem_core::SimpleMemError;
use simplemem_memory::{Capabilities, MemorySystem};

use crate::capabilities::{
    FixedComplexity, HashEmbedder, HeuristicQualityFilter, ScriptedExtractor, TEST_DIMENSIONS,
};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    extractor: ScriptedExtractor,
    embedder: Option<HashEmbedder>,
    complexity: f32,
    window_size: usize,
    on_disk: bool,
    config: Option<SimpleMemConfig>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            extractor: ScriptedExtractor::new(),
            embedder: None,
            complexity: 0.0,
            window_size: BufferConfig::default().window_size,
            on_disk: false,
            config: None,
        }
    }

    /// Use a pre-scripted extractor.
    pub fn with_extractor(mut self, extractor: ScriptedExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Use this embedder; it must produce [`TEST_DIMENSIONS`]-wide vectors.
    pub fn with_embedder(mut self, embedder: HashEmbedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Complexity every query is estimated at.
    pub fn with_complexity(mut self, complexity: f32) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Back the store with a SQLite file instead of an in-memory database.
    pub fn on_disk(mut self) -> Self {
        self.on_disk = true;
        self
    }

    /// Start from this config; storage, dimensions and retry timing are
    /// still overridden for tests.
    pub fn with_config(mut self, config: SimpleMemConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the harness, opening the memory system.
    pub async fn build(self) -> Result<TestHarness, SimpleMemError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| SimpleMemError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let base = self.config.unwrap_or_default();
        let config = SimpleMemConfig {
            storage: StorageConfig {
                database_path: db_path.to_string_lossy().to_string(),
                wal_mode: true,
            },
            buffer: BufferConfig {
                window_size: self.window_size,
            },
            index: IndexConfig {
                embedding_dimensions: TEST_DIMENSIONS,
                ..base.index.clone()
            },
            capabilities: CapabilitiesConfig {
                timeout_ms: 2_000,
                max_attempts: 2,
                initial_backoff_ms: 1,
                max_backoff_ms: 5,
                backoff_multiplier: 2.0,
            },
            ..base
        };

        let quality_filter = Arc::new(HeuristicQualityFilter::default());
        let extractor = Arc::new(self.extractor);
        let embedder = Arc::new(
            self.embedder
                .unwrap_or_else(|| HashEmbedder::new(TEST_DIMENSIONS)),
        );
        let complexity = Arc::new(FixedComplexity::new(self.complexity));
        let capabilities = Capabilities {
            quality_filter: quality_filter.clone(),
            extractor: extractor.clone(),
            embedder: embedder.clone(),
            complexity: complexity.clone(),
        };

        let system = if self.on_disk {
            MemorySystem::open(config, capabilities.clone()).await?
        } else {
            MemorySystem::open_in_memory(config, capabilities.clone()).await?
        };

        Ok(TestHarness {
            system,
            capabilities,
            quality_filter,
            extractor,
            embedder,
            complexity,
            _temp_dir: temp_dir,
        })
    }
}

/// A memory system wired to deterministic capabilities, with handles to
/// each capability for outage simulation and call-count assertions.
pub struct TestHarness {
    pub system: MemorySystem,
    pub quality_filter: Arc<HeuristicQualityFilter>,
    pub extractor: Arc<ScriptedExtractor>,
    pub embedder: Arc<HashEmbedder>,
    pub complexity: Arc<FixedComplexity>,
    capabilities: Capabilities,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default settings.
    pub async fn new() -> Result<Self, SimpleMemError> {
        Self::builder().build().await
    }

    /// Close the system and open a fresh one over the same database and
    /// capabilities. Only meaningful for on-disk harnesses.
    pub async fn reopen(self) -> Result<Self, SimpleMemError> {
        let config = self.system.config().clone();
        drop(self.system);
        let system = MemorySystem::open(config, self.capabilities.clone()).await?;
        Ok(Self { system, ..self })
    }

    /// Buffer turns given as `(speaker, content, timestamp)` and finalize.
    pub async fn ingest(
        &self,
        turns: &[(&str, &str, &str)],
    ) -> Result<simplemem_core::FinalizeSummary, SimpleMemError> {
        for (speaker, content, timestamp) in turns {
            self.system.add_turn(*speaker, *content, *timestamp).await?;
        }
        self.system.finalize().await
    }
}
