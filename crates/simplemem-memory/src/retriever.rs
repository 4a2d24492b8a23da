// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Complexity-adaptive hybrid retrieval.
//!
//! The per-view search depth grows with the estimated complexity of the
//! query. All three views are searched against one snapshot and their ranked
//! lists are merged with reciprocal rank fusion.

use std::sync::Arc;
use std::time::Instant;

use simplemem_config::model::RetrievalConfig;
use simplemem_core::types::{CapabilityKind, Query, RetrievalHit, RetrievalResult, ViewKind};
use simplemem_core::{ComplexityEstimator, EmbeddingAdapter, SimpleMemError};
use tracing::{debug, warn};

use crate::capability::CapabilityInvoker;
use crate::fusion::reciprocal_rank_fusion;
use crate::index::{IndexKey, IndexSnapshot, MultiViewIndex};

#[derive(Debug, Clone)]
pub struct RetrieverSettings {
    /// Default number of fused results when the caller does not choose one.
    pub k_base: usize,
    /// How strongly complexity widens the per-view depth.
    pub delta: f64,
    /// RRF smoothing constant.
    pub rrf_c: f64,
}

impl From<&RetrievalConfig> for RetrieverSettings {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            k_base: config.k_base,
            delta: config.delta,
            rrf_c: config.rrf_c,
        }
    }
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

/// Per-view depth `floor(k_base * (1 + delta * complexity))`, never below `k_base`.
///
/// Complexity is clamped to `[0, 1]`; non-finite values count as zero.
pub fn depth(k_base: usize, delta: f64, complexity: f32) -> usize {
    let complexity = if complexity.is_finite() {
        f64::from(complexity.clamp(0.0, 1.0))
    } else {
        0.0
    };
    let scaled = (k_base as f64 * (1.0 + delta.max(0.0) * complexity)).floor();
    (scaled as usize).max(k_base)
}

pub struct AdaptiveRetriever {
    embedder: Arc<dyn EmbeddingAdapter>,
    estimator: Arc<dyn ComplexityEstimator>,
    invoker: CapabilityInvoker,
    settings: RetrieverSettings,
}

impl AdaptiveRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingAdapter>,
        estimator: Arc<dyn ComplexityEstimator>,
        invoker: CapabilityInvoker,
        settings: RetrieverSettings,
    ) -> Self {
        Self {
            embedder,
            estimator,
            invoker,
            settings,
        }
    }

    pub fn settings(&self) -> &RetrieverSettings {
        &self.settings
    }

    /// Answer `query` from one snapshot of `index`.
    ///
    /// A failing or offline view makes the result partial. Only when every
    /// view is unavailable does the call fail.
    pub async fn retrieve(
        &self,
        index: &MultiViewIndex,
        query: Query,
    ) -> Result<RetrievalResult, SimpleMemError> {
        let started = Instant::now();
        let text = query.text.trim();
        if text.is_empty() {
            return Err(SimpleMemError::InvalidQuery("query text is empty".into()));
        }
        if query.k_base == 0 {
            return Err(SimpleMemError::InvalidQuery("k_base must be at least 1".into()));
        }

        let complexity = self.estimate(text).await;
        let k_dyn = match query.depth_override {
            Some(requested) => requested.max(query.k_base),
            None => depth(query.k_base, self.settings.delta, complexity),
        };

        let snapshot = index.snapshot();
        let online = ViewKind::ALL.map(|view| index.is_online(view));
        let (semantic, lexical, symbolic) = tokio::join!(
            self.search_semantic(&snapshot, text, k_dyn, online[ViewKind::Semantic.index()]),
            async {
                online[ViewKind::Lexical.index()].then(|| snapshot.search_lexical(text, k_dyn))
            },
            async {
                online[ViewKind::Symbolic.index()].then(|| {
                    let filter = snapshot.symbolic_filter(text);
                    snapshot.search_symbolic(&filter, k_dyn)
                })
            },
        );

        let mut lists: Vec<(ViewKind, Vec<IndexKey>)> = Vec::with_capacity(3);
        let mut unavailable_views = Vec::new();
        for (view, result) in ViewKind::ALL.into_iter().zip([semantic, lexical, symbolic]) {
            match result {
                Some(keys) => lists.push((view, keys)),
                None => unavailable_views.push(view),
            }
        }
        if lists.is_empty() {
            return Err(SimpleMemError::RetrievalUnavailable(
                "every index view failed or is offline".into(),
            ));
        }

        let fused = reciprocal_rank_fusion(&lists, self.settings.rrf_c, |key| {
            snapshot.resolve(key).map(|fact| fact.recency())
        });
        let hits: Vec<RetrievalHit> = fused
            .into_iter()
            .filter_map(|f| {
                snapshot.resolve(&f.key).map(|fact| RetrievalHit {
                    fact: (*fact).clone(),
                    score: f.score,
                    ranks: f.ranks,
                })
            })
            .take(query.k_base)
            .collect();

        if !unavailable_views.is_empty() {
            warn!(
                unavailable = ?unavailable_views,
                hits = hits.len(),
                "returning partial retrieval result"
            );
            crate::metrics::record_partial_retrieval(&unavailable_views);
        }
        crate::metrics::record_retrieval_latency(started.elapsed().as_secs_f64());
        debug!(
            complexity,
            k_base = query.k_base,
            k_dyn,
            hits = hits.len(),
            "query answered"
        );

        Ok(RetrievalResult {
            query: query.text,
            hits,
            complexity,
            k_base: query.k_base,
            k_dyn,
            unavailable_views,
        })
    }

    /// Query complexity in `[0, 1]`, or 0 when the estimator fails.
    async fn estimate(&self, text: &str) -> f32 {
        let estimator = &self.estimator;
        match self
            .invoker
            .invoke(CapabilityKind::Complexity, move || estimator.estimate(text))
            .await
        {
            Ok(c) if c.is_finite() => c.clamp(0.0, 1.0),
            Ok(c) => {
                warn!(value = c, "complexity estimate is not a number; using 0");
                0.0
            }
            Err(err) => {
                warn!(error = %err, "complexity estimation failed; using 0");
                0.0
            }
        }
    }

    /// Top `k` semantic matches, or `None` if the view is unavailable.
    async fn search_semantic(
        &self,
        snapshot: &IndexSnapshot,
        text: &str,
        k: usize,
        online: bool,
    ) -> Option<Vec<IndexKey>> {
        if !online {
            return None;
        }
        if snapshot.is_empty() {
            return Some(Vec::new());
        }

        let embedder = &self.embedder;
        let texts = vec![text.to_string()];
        let embedded = self
            .invoker
            .invoke(CapabilityKind::Embedding, move || embedder.embed(texts.clone()))
            .await;
        match embedded {
            Ok(vectors) => match vectors.into_iter().next() {
                Some(vector) if vector.len() == snapshot.dimensions() => {
                    Some(snapshot.search_semantic(&vector, k))
                }
                _ => {
                    warn!("query embedding has the wrong shape; semantic view skipped");
                    None
                }
            },
            Err(err) => {
                warn!(error = %err, "query embedding failed; semantic view skipped");
                None
            }
        }
    }
}
