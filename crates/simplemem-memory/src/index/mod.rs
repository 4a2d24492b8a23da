// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-view index over current fact versions.
//!
//! The three views live together in one immutable [`IndexSnapshot`]. Writers
//! build the next snapshot off to the side and publish it with a single
//! compare-and-swap, so a reader that loads a snapshot sees every view at the
//! same fact versions for as long as it holds it. A batch of facts is staged
//! into one copy of the snapshot and published once.

mod lexical;
mod semantic;
mod symbolic;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use simplemem_config::model::IndexConfig;
use simplemem_core::types::{AtomicFact, FactId, ViewKind};
use simplemem_core::SimpleMemError;
use tracing::{debug, error, info};

use lexical::LexicalView;
use semantic::SemanticView;
use symbolic::SymbolicView;

pub use semantic::cosine_similarity;
pub use symbolic::SymbolicFilter;

/// Back-reference from a view entry to the fact version it projects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey {
    pub fact_id: FactId,
    pub version: u64,
}

impl IndexKey {
    pub fn new(fact_id: FactId, version: u64) -> Self {
        Self { fact_id, version }
    }
}

/// Versions of `id` present in a view keyed by [`IndexKey`].
fn versions_in<V>(map: &BTreeMap<IndexKey, V>, id: &FactId) -> Vec<u64> {
    let lo = IndexKey::new(id.clone(), 0);
    let hi = IndexKey::new(id.clone(), u64::MAX);
    map.range(lo..=hi).map(|(k, _)| k.version).collect()
}

/// Result of an [`MultiViewIndex::index`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The version was staged and published.
    Indexed,
    /// That exact version was already current; nothing changed.
    Unchanged,
}

/// Immutable state of all three views plus the current-version registry.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    semantic: SemanticView,
    lexical: LexicalView,
    symbolic: SymbolicView,
    facts: HashMap<FactId, Arc<AtomicFact>>,
    quarantined: HashSet<FactId>,
    generation: u64,
}

impl IndexSnapshot {
    fn empty(dimensions: usize, bm25_k1: f64, bm25_b: f64) -> Self {
        Self {
            semantic: SemanticView::new(dimensions),
            lexical: LexicalView::new(bm25_k1, bm25_b),
            symbolic: SymbolicView::default(),
            facts: HashMap::new(),
            quarantined: HashSet::new(),
            generation: 0,
        }
    }

    /// Number of publications that led to this snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of facts with a current version in the index.
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.semantic.dimensions()
    }

    pub fn quarantined_count(&self) -> usize {
        self.quarantined.len()
    }

    pub fn is_quarantined(&self, id: &FactId) -> bool {
        self.quarantined.contains(id)
    }

    /// Ids of every fact with a current version in the index.
    pub fn indexed_ids(&self) -> impl Iterator<Item = &FactId> {
        self.facts.keys()
    }

    /// Current version of a fact.
    pub fn current(&self, id: &FactId) -> Option<&Arc<AtomicFact>> {
        self.facts.get(id)
    }

    /// The fact a view entry points to, if it is the current, non-quarantined version.
    pub fn resolve(&self, key: &IndexKey) -> Option<Arc<AtomicFact>> {
        if self.quarantined.contains(&key.fact_id) {
            return None;
        }
        self.facts
            .get(&key.fact_id)
            .filter(|f| f.version == key.version)
            .cloned()
    }

    pub fn search_semantic(&self, query: &[f32], k: usize) -> Vec<IndexKey> {
        self.semantic
            .search(query, k)
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    }

    pub fn search_lexical(&self, query: &str, k: usize) -> Vec<IndexKey> {
        self.lexical
            .search(query, k)
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    }

    pub fn symbolic_filter(&self, query: &str) -> SymbolicFilter {
        self.symbolic.infer_filter(query)
    }

    pub fn search_symbolic(&self, filter: &SymbolicFilter, k: usize) -> Vec<IndexKey> {
        self.symbolic.search(filter, k)
    }

    /// Known entities, most frequently mentioned first.
    pub fn entity_salience(&self) -> Vec<(String, usize)> {
        self.symbolic.entity_salience()
    }

    /// Entry counts per view, in [`ViewKind::ALL`] order.
    pub fn view_sizes(&self) -> [usize; 3] {
        [self.semantic.len(), self.lexical.len(), self.symbolic.len()]
    }

    /// Versions of `id` held by each view.
    fn view_versions(&self, id: &FactId) -> [Vec<u64>; 3] {
        [
            self.semantic.versions_of(id),
            self.lexical.versions_of(id),
            self.symbolic.versions_of(id),
        ]
    }

    /// Describe how the views disagree about `id`, if they do.
    fn inconsistency(&self, id: &FactId) -> Option<String> {
        let expected: Vec<u64> = self.facts.get(id).map(|f| f.version).into_iter().collect();
        let problems: Vec<String> = ViewKind::ALL
            .iter()
            .zip(self.view_versions(id))
            .filter(|(_, held)| *held != expected)
            .map(|(view, held)| format!("{view} view holds versions {held:?}"))
            .collect();
        if problems.is_empty() {
            None
        } else {
            Some(format!(
                "current version {:?}, but {}",
                expected.first(),
                problems.join("; ")
            ))
        }
    }

    /// Every fact id with an entry in any view.
    fn view_ids(&self) -> BTreeSet<FactId> {
        self.semantic
            .keys()
            .chain(self.lexical.keys())
            .chain(self.symbolic.keys())
            .map(|k| k.fact_id.clone())
            .collect()
    }

    fn remove_all_versions(&mut self, id: &FactId) {
        let versions: BTreeSet<u64> = self.view_versions(id).into_iter().flatten().collect();
        for version in versions {
            let key = IndexKey::new(id.clone(), version);
            self.semantic.remove(&key);
            self.lexical.remove(&key);
            self.symbolic.remove(&key);
        }
    }

    /// Stage one fact version into this (unpublished) snapshot.
    fn stage(&mut self, fact: &Arc<AtomicFact>) -> Result<IndexOutcome, SimpleMemError> {
        if self.quarantined.contains(&fact.id) {
            return Err(SimpleMemError::IndexConsistencyViolation {
                fact_id: fact.id.to_string(),
                detail: "fact is quarantined; write rejected".to_string(),
            });
        }
        if let Some(existing) = self.facts.get(&fact.id) {
            if existing.version == fact.version {
                return Ok(IndexOutcome::Unchanged);
            }
            if existing.version > fact.version {
                return Err(SimpleMemError::Internal(format!(
                    "fact {} version {} is older than indexed version {}",
                    fact.id, fact.version, existing.version
                )));
            }
        }
        self.semantic.check(&fact.embedding).map_err(|detail| {
            SimpleMemError::Internal(format!("cannot index fact {}: {detail}", fact.id))
        })?;

        self.remove_all_versions(&fact.id);
        self.insert(Arc::clone(fact));
        Ok(IndexOutcome::Indexed)
    }

    fn insert(&mut self, fact: Arc<AtomicFact>) {
        let key = IndexKey::new(fact.id.clone(), fact.version);
        self.semantic.insert(key.clone(), &fact.embedding);
        self.lexical.insert(key.clone(), &fact);
        self.symbolic.insert(key, &fact);
        self.facts.insert(fact.id.clone(), fact);
    }
}

enum Staged<R> {
    Unchanged(R),
    Next(IndexSnapshot, R),
}

/// Semantic, lexical, and symbolic views with atomic snapshot publication.
pub struct MultiViewIndex {
    snapshot: ArcSwap<IndexSnapshot>,
    offline: [AtomicBool; 3],
}

impl MultiViewIndex {
    pub fn new(config: &IndexConfig) -> Self {
        Self::with_params(config.embedding_dimensions, config.bm25_k1, config.bm25_b)
    }

    pub fn with_params(dimensions: usize, bm25_k1: f64, bm25_b: f64) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(IndexSnapshot::empty(dimensions, bm25_k1, bm25_b)),
            offline: Default::default(),
        }
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.snapshot.load_full()
    }

    /// Whether the semantic view would accept `embedding`.
    pub fn check_embedding(&self, embedding: &[f32]) -> Result<(), String> {
        self.snapshot.load().semantic.check(embedding)
    }

    /// Stage one fact version into all three views and publish.
    ///
    /// Entries for any other version of the same fact are dropped in the same
    /// publication. Re-indexing the current version is a no-op. Nothing is
    /// published if staging fails.
    pub fn index(&self, fact: Arc<AtomicFact>) -> Result<IndexOutcome, SimpleMemError> {
        self.index_batch(std::slice::from_ref(&fact))
            .pop()
            .unwrap_or(Ok(IndexOutcome::Unchanged))
    }

    /// Stage every fact in `facts`, in order, and publish them together.
    ///
    /// Returns one outcome per fact. A fact that fails to stage leaves the
    /// others untouched; the snapshot is copied and published at most once
    /// unless another writer publishes in between.
    pub fn index_batch(
        &self,
        facts: &[Arc<AtomicFact>],
    ) -> Vec<Result<IndexOutcome, SimpleMemError>> {
        if facts.is_empty() {
            return Vec::new();
        }
        let outcomes = self.publish(|current| {
            let mut next = current.clone();
            let outcomes: Vec<Result<IndexOutcome, SimpleMemError>> =
                facts.iter().map(|fact| next.stage(fact)).collect();
            if outcomes
                .iter()
                .any(|o| matches!(o, Ok(IndexOutcome::Indexed)))
            {
                next.generation += 1;
                Staged::Next(next, outcomes)
            } else {
                Staged::Unchanged(outcomes)
            }
        });
        for (fact, outcome) in facts.iter().zip(&outcomes) {
            match outcome {
                Ok(outcome) => {
                    debug!(fact_id = %fact.id, version = fact.version, ?outcome, "fact indexed");
                }
                Err(err) => debug!(fact_id = %fact.id, error = %err, "fact not indexed"),
            }
        }
        outcomes
    }

    /// Remove every entry for one version of a fact. Returns whether anything was removed.
    pub fn retract(&self, id: &FactId, version: u64) -> bool {
        let key = IndexKey::new(id.clone(), version);
        self.update(|current| {
            let present = current.view_versions(id).iter().any(|v| v.contains(&version));
            let is_current = current.facts.get(id).is_some_and(|f| f.version == version);
            if !present && !is_current {
                return Ok(Staged::Unchanged(false));
            }
            let mut next = current.clone();
            next.semantic.remove(&key);
            next.lexical.remove(&key);
            next.symbolic.remove(&key);
            if is_current {
                next.facts.remove(id);
            }
            next.generation += 1;
            Ok(Staged::Next(next, true))
        })
        .unwrap_or(false)
    }

    /// Check that every view holds exactly the current version of `id`.
    ///
    /// On disagreement the fact is quarantined: it drops out of query results
    /// and further writes to it are rejected.
    pub fn verify(&self, id: &FactId) -> Result<(), SimpleMemError> {
        let Some(detail) = self.snapshot.load().inconsistency(id) else {
            return Ok(());
        };
        self.quarantine(id, &detail);
        Err(SimpleMemError::IndexConsistencyViolation {
            fact_id: id.to_string(),
            detail,
        })
    }

    /// Verify every fact known to any view; returns one error per violation found.
    pub fn check_consistency(&self) -> Vec<SimpleMemError> {
        let snapshot = self.snapshot();
        let mut ids: BTreeSet<FactId> = snapshot.facts.keys().cloned().collect();
        ids.extend(snapshot.view_ids());
        ids.into_iter()
            .filter(|id| !snapshot.quarantined.contains(id))
            .filter_map(|id| self.verify(&id).err())
            .collect()
    }

    /// Quarantine `id` over a disagreement found outside the views, such as
    /// with the fact store, and return the violation.
    pub fn report_violation(&self, id: &FactId, detail: String) -> SimpleMemError {
        self.quarantine(id, &detail);
        SimpleMemError::IndexConsistencyViolation {
            fact_id: id.to_string(),
            detail,
        }
    }

    fn quarantine(&self, id: &FactId, detail: &str) {
        let newly = self
            .update(|current| {
                if current.quarantined.contains(id) {
                    return Ok(Staged::Unchanged(false));
                }
                let mut next = current.clone();
                next.quarantined.insert(id.clone());
                next.generation += 1;
                Ok(Staged::Next(next, true))
            })
            .unwrap_or(false);
        if newly {
            error!(fact_id = %id, detail, "index consistency violation; fact quarantined");
            crate::metrics::record_index_violation();
        }
    }

    /// Replace the whole index with projections of `facts`, published once.
    ///
    /// Facts that cannot be staged are skipped and reported.
    pub fn rebuild(&self, facts: Vec<AtomicFact>) -> Vec<SimpleMemError> {
        let current = self.snapshot();
        let (k1, b) = current.lexical.params();
        let mut next = IndexSnapshot::empty(current.semantic.dimensions(), k1, b);
        let mut errors = Vec::new();
        for fact in facts {
            if let Err(detail) = next.semantic.check(&fact.embedding) {
                errors.push(SimpleMemError::Internal(format!(
                    "cannot index fact {}: {detail}",
                    fact.id
                )));
                continue;
            }
            next.insert(Arc::new(fact));
        }
        next.generation = current.generation + 1;
        info!(facts = next.facts.len(), skipped = errors.len(), "index rebuilt");
        self.snapshot.store(Arc::new(next));
        errors
    }

    /// Drop every entry and every quarantine mark.
    pub fn clear(&self) {
        let current = self.snapshot();
        let (k1, b) = current.lexical.params();
        let mut next = IndexSnapshot::empty(current.semantic.dimensions(), k1, b);
        next.generation = current.generation + 1;
        self.snapshot.store(Arc::new(next));
    }

    /// Take a view offline; queries report it unavailable until resumed.
    pub fn suspend_view(&self, view: ViewKind) {
        self.offline[view.index()].store(true, Ordering::SeqCst);
        info!(%view, "view suspended");
    }

    pub fn resume_view(&self, view: ViewKind) {
        self.offline[view.index()].store(false, Ordering::SeqCst);
        info!(%view, "view resumed");
    }

    pub fn is_online(&self, view: ViewKind) -> bool {
        !self.offline[view.index()].load(Ordering::SeqCst)
    }

    /// Run `stage` against the current snapshot and publish its result,
    /// retrying from the new snapshot if another writer published first.
    fn publish<R>(&self, mut stage: impl FnMut(&IndexSnapshot) -> Staged<R>) -> R {
        loop {
            let current = self.snapshot.load_full();
            match stage(&current) {
                Staged::Unchanged(result) => return result,
                Staged::Next(next, result) => {
                    let previous = self.snapshot.compare_and_swap(&current, Arc::new(next));
                    if Arc::ptr_eq(&*previous, &current) {
                        return result;
                    }
                }
            }
        }
    }

    /// [`Self::publish`] for stages that can fail before producing a snapshot.
    fn update<R>(
        &self,
        mut stage: impl FnMut(&IndexSnapshot) -> Result<Staged<R>, SimpleMemError>,
    ) -> Result<R, SimpleMemError> {
        self.publish(|current| match stage(current) {
            Ok(Staged::Unchanged(result)) => Staged::Unchanged(Ok(result)),
            Ok(Staged::Next(next, result)) => Staged::Next(next, Ok(result)),
            Err(err) => Staged::Unchanged(Err(err)),
        })
    }
}
