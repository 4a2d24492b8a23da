// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `MemorySystem` facade.
//!
//! Owns the buffer, store, index, compressor and retriever, and runs the
//! write path: drain windows, compress them in parallel, embed the drafts,
//! write each fact version to the store under a per-fact lock, then publish
//! the whole batch to the index at once. A version the index rejects is
//! removed from the store again.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use simplemem_config::SimpleMemConfig;
use simplemem_core::types::{
    AtomicFact, CapabilityKind, DialogueTurn, FactDraft, FactId, FinalizeSummary, HealthStatus,
    MemoryStats, Query, Resolution, RetrievalResult, TurnId, TurnInput, ViewKind,
};
use simplemem_core::{
    CapabilityError, ComplexityEstimator, EmbeddingAdapter, FactExtractor, QualityFilter,
    SimpleMemError,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::buffer::DialogueBuffer;
use crate::capability::{CapabilityInvoker, RetryPolicy};
use crate::compressor::{CompressorSettings, SemanticCompressor, WindowOutcome};
use crate::index::MultiViewIndex;
use crate::retriever::{AdaptiveRetriever, RetrieverSettings};
use crate::store::FactStore;

/// Page size of [`MemorySystem::list_facts`] when the caller gives none.
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// The four external capabilities the pipeline depends on.
#[derive(Clone)]
pub struct Capabilities {
    pub quality_filter: Arc<dyn QualityFilter>,
    pub extractor: Arc<dyn FactExtractor>,
    pub embedder: Arc<dyn EmbeddingAdapter>,
    pub complexity: Arc<dyn ComplexityEstimator>,
}

pub struct MemorySystem {
    config: SimpleMemConfig,
    capabilities: Capabilities,
    invoker: CapabilityInvoker,
    buffer: DialogueBuffer,
    store: FactStore,
    index: MultiViewIndex,
    compressor: SemanticCompressor,
    retriever: AdaptiveRetriever,
    fact_locks: DashMap<String, Arc<Mutex<()>>>,
    /// Held shared by commits and exclusively by store/index comparison.
    commit_gate: RwLock<()>,
}

impl MemorySystem {
    /// Open the database named in `config` and rebuild the index from it.
    pub async fn open(
        config: SimpleMemConfig,
        capabilities: Capabilities,
    ) -> Result<Self, SimpleMemError> {
        let store =
            FactStore::open(&config.storage.database_path, config.storage.wal_mode).await?;
        Self::with_store(config, capabilities, store).await
    }

    /// A system backed by a private in-memory database.
    pub async fn open_in_memory(
        config: SimpleMemConfig,
        capabilities: Capabilities,
    ) -> Result<Self, SimpleMemError> {
        let store = FactStore::open_in_memory().await?;
        Self::with_store(config, capabilities, store).await
    }

    async fn with_store(
        config: SimpleMemConfig,
        capabilities: Capabilities,
        store: FactStore,
    ) -> Result<Self, SimpleMemError> {
        let dimensions = capabilities.embedder.dimensions();
        if dimensions != config.index.embedding_dimensions {
            return Err(SimpleMemError::Config(format!(
                "embedder `{}` produces {dimensions}-dimensional vectors, index.embedding_dimensions is {}",
                capabilities.embedder.name(),
                config.index.embedding_dimensions
            )));
        }

        let invoker = CapabilityInvoker::new(RetryPolicy::from(&config.capabilities));
        let compressor = SemanticCompressor::new(
            Arc::clone(&capabilities.quality_filter),
            Arc::clone(&capabilities.extractor),
            invoker.clone(),
            CompressorSettings::from(&config.compression),
        );
        let retriever = AdaptiveRetriever::new(
            Arc::clone(&capabilities.embedder),
            Arc::clone(&capabilities.complexity),
            invoker.clone(),
            RetrieverSettings::from(&config.retrieval),
        );

        let meta = store.meta().await?;
        let index = MultiViewIndex::new(&config.index);
        let skipped = index.rebuild(store.load_current().await?);
        for err in &skipped {
            warn!(error = %err, "stored fact could not be indexed");
        }

        info!(
            database = store.path(),
            facts = index.snapshot().len(),
            next_turn = meta.next_turn_seq,
            "memory system opened"
        );

        Ok(Self {
            buffer: DialogueBuffer::starting_at(meta.next_turn_seq),
            config,
            capabilities,
            invoker,
            store,
            index,
            compressor,
            retriever,
            fact_locks: DashMap::new(),
            commit_gate: RwLock::new(()),
        })
    }

    pub fn config(&self) -> &SimpleMemConfig {
        &self.config
    }

    /// Buffer one turn. The timestamp must resolve to an absolute time.
    pub async fn add_turn(
        &self,
        speaker: impl Into<String>,
        content: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Result<TurnId, SimpleMemError> {
        let id = self
            .buffer
            .append(TurnInput::new(speaker, content, timestamp))
            .await?;
        crate::metrics::record_turns_buffered(1);
        crate::metrics::set_buffered_turns(self.buffer.len().await);
        Ok(id)
    }

    /// Buffer several turns; if any is invalid none are buffered.
    pub async fn add_turns_batch(
        &self,
        turns: Vec<TurnInput>,
    ) -> Result<Vec<TurnId>, SimpleMemError> {
        let ids = self.buffer.append_batch(turns).await?;
        crate::metrics::record_turns_buffered(ids.len());
        crate::metrics::set_buffered_turns(self.buffer.len().await);
        Ok(ids)
    }

    /// Compress everything buffered into stored, indexed facts.
    ///
    /// Windows whose capabilities are unavailable go back into the buffer and
    /// are reported, not returned as errors. Windows that failed in a way a
    /// retry would repeat are reported and dropped. An empty buffer is a no-op.
    pub async fn finalize(&self) -> Result<FinalizeSummary, SimpleMemError> {
        let started = Instant::now();
        let windows = self
            .buffer
            .drain_windows(self.config.buffer.window_size)
            .await;
        if windows.is_empty() {
            debug!("finalize called with an empty buffer");
            return Ok(FinalizeSummary::default());
        }

        let known_entities = self.index.snapshot().entity_salience();
        let parallel = self.config.compression.max_parallel_windows.max(1);
        let compressed: Vec<(Vec<DialogueTurn>, Result<WindowOutcome, SimpleMemError>)> =
            stream::iter(windows)
                .map(|window| {
                    let known = &known_entities;
                    async move {
                        let outcome = self.compressor.compress(&window, known).await;
                        (window, outcome)
                    }
                })
                .buffered(parallel)
                .collect()
                .await;

        let mut summary = FinalizeSummary::default();
        let mut turns_processed = 0u64;
        let mut pending: Vec<(FactDraft, Vec<f32>)> = Vec::new();
        for (window, outcome) in compressed {
            let embedded = match outcome {
                Ok(outcome) => self
                    .embed_drafts(&outcome.drafts)
                    .await
                    .map(|embeddings| (outcome, embeddings)),
                Err(err) => Err(err),
            };
            let (outcome, embeddings) = match embedded {
                Ok(embedded) => embedded,
                Err(err) if err.is_retryable() => {
                    self.defer(window, &err, &mut summary).await;
                    continue;
                }
                Err(err) => {
                    turns_processed += window.len() as u64;
                    Self::drop_window(&window, &err, &mut summary);
                    continue;
                }
            };

            pending.extend(outcome.drafts.into_iter().zip(embeddings));
            summary.errors.extend(outcome.errors.iter().map(Into::into));
            summary.compression.merge(&outcome.stats);
            summary.windows_processed += 1;
            turns_processed += window.len() as u64;
            crate::metrics::record_turns_filtered(outcome.stats.turns_filtered);
        }

        self.commit_all(pending, &mut summary).await;

        if turns_processed > 0 {
            let next_seq = self.buffer.next_seq().await;
            self.store
                .record_finalize(turns_processed, next_seq, Utc::now())
                .await?;
        }

        crate::metrics::record_facts(
            summary.facts_created,
            summary.facts_updated,
            summary.facts_unresolved,
        );
        crate::metrics::set_buffered_turns(self.buffer.len().await);
        crate::metrics::record_finalize_latency(started.elapsed().as_secs_f64());
        info!(
            created = summary.facts_created,
            updated = summary.facts_updated,
            unresolved = summary.facts_unresolved,
            windows = summary.windows_processed,
            deferred = summary.windows_deferred,
            dropped = summary.windows_dropped,
            errors = summary.errors.len(),
            "finalize complete"
        );
        Ok(summary)
    }

    async fn defer(
        &self,
        window: Vec<DialogueTurn>,
        err: &SimpleMemError,
        summary: &mut FinalizeSummary,
    ) {
        warn!(turns = window.len(), error = %err, "window deferred");
        self.buffer.restore(window).await;
        summary.windows_deferred += 1;
        summary.errors.push(err.into());
        crate::metrics::record_window_deferred();
    }

    fn drop_window(window: &[DialogueTurn], err: &SimpleMemError, summary: &mut FinalizeSummary) {
        error!(turns = window.len(), error = %err, "window dropped");
        summary.windows_dropped += 1;
        summary.errors.push(err.into());
        crate::metrics::record_window_dropped();
    }

    /// Embed every draft's canonical text in one call.
    ///
    /// Every vector must be one the semantic view accepts, so nothing reaches
    /// the store that the index would refuse.
    async fn embed_drafts(&self, drafts: &[FactDraft]) -> Result<Vec<Vec<f32>>, SimpleMemError> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = drafts.iter().map(|d| d.text.clone()).collect();
        let embedder = &self.capabilities.embedder;
        let vectors = self
            .invoker
            .invoke(CapabilityKind::Embedding, move || embedder.embed(texts.clone()))
            .await?;
        if vectors.len() != drafts.len() {
            return Err(CapabilityError::InvalidResponse {
                capability: CapabilityKind::Embedding,
                message: format!("{} vectors for {} texts", vectors.len(), drafts.len()),
            }
            .into());
        }
        for (i, vector) in vectors.iter().enumerate() {
            self.index.check_embedding(vector).map_err(|detail| {
                CapabilityError::InvalidResponse {
                    capability: CapabilityKind::Embedding,
                    message: format!("vector {i}: {detail}"),
                }
            })?;
        }
        Ok(vectors)
    }

    /// Commit drafts as new facts or as the next version of the fact sharing
    /// their correlation key.
    ///
    /// Each version is written to the store under its fact's lock; the batch
    /// is then published to the index in one step. A version the index
    /// rejects is reverted in the store, so the two never disagree.
    async fn commit_all(
        &self,
        pending: Vec<(FactDraft, Vec<f32>)>,
        summary: &mut FinalizeSummary,
    ) {
        if pending.is_empty() {
            return;
        }
        let keys: BTreeSet<String> = pending
            .iter()
            .filter_map(|(draft, _)| draft.correlation_key.clone())
            .collect();
        let _gate = self.commit_gate.read().await;
        let guards = self.lock_facts(&keys).await;

        let mut stored: Vec<Arc<AtomicFact>> = Vec::with_capacity(pending.len());
        for (draft, embedding) in pending {
            match self.store_draft(draft, embedding).await {
                Ok(fact) => stored.push(fact),
                Err(err) => {
                    warn!(error = %err, "fact could not be stored");
                    summary.errors.push((&err).into());
                }
            }
        }

        let outcomes = self.index.index_batch(&stored);
        let mut rejected: Vec<&Arc<AtomicFact>> = Vec::new();
        for (fact, outcome) in stored.iter().zip(outcomes) {
            if let Err(err) = outcome {
                warn!(
                    fact_id = %fact.id,
                    version = fact.version,
                    error = %err,
                    "fact could not be indexed"
                );
                summary.errors.push((&err).into());
                rejected.push(fact);
                continue;
            }
            if let Err(err) = self.index.verify(&fact.id) {
                summary.errors.push((&err).into());
                continue;
            }
            debug!(fact_id = %fact.id, version = fact.version, "fact committed");
            if fact.version == 1 {
                summary.facts_created += 1;
            } else {
                summary.facts_updated += 1;
            }
            if fact.resolution == Resolution::Unresolved {
                summary.facts_unresolved += 1;
            }
        }
        for fact in rejected.into_iter().rev() {
            if let Err(err) = self.store.revert_version(&fact.id, fact.version).await {
                error!(
                    fact_id = %fact.id,
                    version = fact.version,
                    error = %err,
                    "store write could not be reverted"
                );
                summary.errors.push((&err).into());
            }
        }

        drop(guards);
        for key in &keys {
            self.fact_locks
                .remove_if(key, |_, held| Arc::strong_count(held) == 1);
        }
    }

    /// Take the per-fact lock of every correlation key, in key order.
    async fn lock_facts(&self, keys: &BTreeSet<String>) -> Vec<OwnedMutexGuard<()>> {
        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let lock = Arc::clone(self.fact_locks.entry(key.clone()).or_default().value());
            guards.push(lock.lock_owned().await);
        }
        guards
    }

    /// Assign an identity and version to `draft` and write it to the store.
    async fn store_draft(
        &self,
        draft: FactDraft,
        embedding: Vec<f32>,
    ) -> Result<Arc<AtomicFact>, SimpleMemError> {
        let now = Utc::now();
        let existing = match &draft.correlation_key {
            Some(key) => self.store.find_by_correlation(key).await?,
            None => None,
        };
        let (id, version, created_at) = match existing {
            Some((id, current)) => {
                let created_at = self
                    .store
                    .get_current(&id)
                    .await?
                    .map_or(now, |f| f.created_at);
                (id, current + 1, created_at)
            }
            None => (FactId(Uuid::new_v4().to_string()), 1, now),
        };

        if self.index.snapshot().is_quarantined(&id) {
            return Err(SimpleMemError::IndexConsistencyViolation {
                fact_id: id.to_string(),
                detail: "fact is quarantined; write rejected".into(),
            });
        }

        let fact = Arc::new(AtomicFact {
            id,
            version,
            text: draft.text,
            source_turns: draft.source_turns,
            speakers: draft.speakers,
            entities: draft.entities,
            keywords: draft.keywords,
            time: draft.time,
            observed_at: draft.observed_at,
            resolution: draft.resolution,
            unresolved_references: draft.unresolved_references,
            correlation_key: draft.correlation_key,
            embedding,
            created_at,
            versioned_at: now,
        });

        self.store.commit_version(&fact).await?;
        Ok(fact)
    }

    /// Retrieve facts for `text`; `k_base` defaults to `retrieval.k_base`.
    pub async fn ask(
        &self,
        text: &str,
        k_base: Option<usize>,
    ) -> Result<RetrievalResult, SimpleMemError> {
        let k_base = k_base.unwrap_or(self.retriever.settings().k_base);
        self.ask_query(Query::new(text, k_base)).await
    }

    pub async fn ask_query(&self, query: Query) -> Result<RetrievalResult, SimpleMemError> {
        self.retriever.retrieve(&self.index, query).await
    }

    pub async fn stats(&self) -> Result<MemoryStats, SimpleMemError> {
        let meta = self.store.meta().await?;
        let snapshot = self.index.snapshot();
        Ok(MemoryStats {
            total_turns_processed: meta.total_turns_processed,
            total_facts_stored: self.store.count_current().await?,
            buffered_turns: self.buffer.len().await,
            last_finalized_at: meta.last_finalized_at,
            database_path: self.store.path().to_string(),
            indexed_facts: snapshot.len(),
            quarantined_facts: snapshot.quarantined_count(),
        })
    }

    /// Current fact versions in creation order.
    pub async fn list_facts(
        &self,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<AtomicFact>, SimpleMemError> {
        self.store
            .list_current(limit.unwrap_or(DEFAULT_LIST_LIMIT), offset)
            .await
    }

    pub async fn get_fact(&self, id: &FactId) -> Result<Option<AtomicFact>, SimpleMemError> {
        self.store.get_current(id).await
    }

    /// Every stored version number of a fact, oldest first.
    pub async fn fact_versions(&self, id: &FactId) -> Result<Vec<u64>, SimpleMemError> {
        self.store.versions(id).await
    }

    /// Delete every fact and buffered turn; the system behaves as freshly opened.
    pub async fn clear(&self) -> Result<(), SimpleMemError> {
        self.store.clear().await?;
        self.index.clear();
        self.buffer.reset(1).await;
        self.fact_locks.clear();
        crate::metrics::set_buffered_turns(0);
        info!("memory cleared");
        Ok(())
    }

    pub fn suspend_view(&self, view: ViewKind) {
        self.index.suspend_view(view);
    }

    pub fn resume_view(&self, view: ViewKind) {
        self.index.resume_view(view);
    }

    /// Verify every indexed fact against the other views and against the
    /// store; violations are quarantined and returned.
    pub async fn check_consistency(&self) -> Result<Vec<SimpleMemError>, SimpleMemError> {
        let _gate = self.commit_gate.write().await;
        let mut violations = self.index.check_consistency();

        let snapshot = self.index.snapshot();
        let stored: HashMap<FactId, u64> =
            self.store.current_versions().await?.into_iter().collect();
        let mut ids: BTreeSet<&FactId> = stored.keys().collect();
        ids.extend(snapshot.indexed_ids());
        for id in ids {
            if snapshot.is_quarantined(id) {
                continue;
            }
            let in_store = stored.get(id).copied();
            let in_index = snapshot.current(id).map(|f| f.version);
            if in_store != in_index {
                let detail = format!("store holds version {in_store:?}, index holds {in_index:?}");
                violations.push(self.index.report_violation(id, detail));
            }
        }
        Ok(violations)
    }

    /// Health of each capability. A failed health check reports `Unhealthy`.
    pub async fn health(&self) -> Vec<(CapabilityKind, HealthStatus)> {
        let caps = &self.capabilities;
        let (quality, extraction, embedding, complexity) = tokio::join!(
            caps.quality_filter.health_check(),
            caps.extractor.health_check(),
            caps.embedder.health_check(),
            caps.complexity.health_check(),
        );
        [
            (CapabilityKind::QualityFilter, quality),
            (CapabilityKind::Extraction, extraction),
            (CapabilityKind::Embedding, embedding),
            (CapabilityKind::Complexity, complexity),
        ]
        .into_iter()
        .map(|(kind, status)| {
            (
                kind,
                status.unwrap_or_else(|err| HealthStatus::Unhealthy(err.to_string())),
            )
        })
        .collect()
    }
}
