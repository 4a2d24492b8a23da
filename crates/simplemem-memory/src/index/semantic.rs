// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic view: exact nearest-neighbour search over fact embeddings.

use std::collections::BTreeMap;
use std::sync::Arc;

use simplemem_core::types::FactId;

use super::IndexKey;

/// Cosine similarity of two equal-length vectors; zero when either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

#[derive(Debug, Clone)]
pub(crate) struct SemanticView {
    dimensions: usize,
    vectors: BTreeMap<IndexKey, Arc<[f32]>>,
}

impl SemanticView {
    pub(crate) fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: BTreeMap::new(),
        }
    }

    pub(crate) fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Check a vector can be inserted, without inserting it.
    pub(crate) fn check(&self, embedding: &[f32]) -> Result<(), String> {
        if embedding.len() != self.dimensions {
            return Err(format!(
                "embedding has {} dimensions, semantic view expects {}",
                embedding.len(),
                self.dimensions
            ));
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err("embedding contains non-finite values".to_string());
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, key: IndexKey, embedding: &[f32]) {
        self.vectors.insert(key, Arc::from(embedding));
    }

    pub(crate) fn remove(&mut self, key: &IndexKey) -> bool {
        self.vectors.remove(key).is_some()
    }

    pub(crate) fn versions_of(&self, id: &FactId) -> Vec<u64> {
        super::versions_in(&self.vectors, id)
    }

    pub(crate) fn len(&self) -> usize {
        self.vectors.len()
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &IndexKey> {
        self.vectors.keys()
    }

    /// Top `k` entries by cosine similarity to `query`; ties break on key order.
    pub(crate) fn search(&self, query: &[f32], k: usize) -> Vec<(IndexKey, f32)> {
        if k == 0 || query.len() != self.dimensions {
            return Vec::new();
        }
        let mut scored: Vec<(IndexKey, f32)> = self
            .vectors
            .iter()
            .map(|(key, v)| (key.clone(), cosine_similarity(query, v)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }
}
