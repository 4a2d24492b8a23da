// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lexical view: inverted index with BM25 scoring.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use simplemem_core::types::{AtomicFact, FactId};

use super::IndexKey;
use crate::text::tokenize;

/// Term-frequency weight of extraction keywords relative to body terms.
const KEYWORD_BOOST: u32 = 2;

#[derive(Debug, Clone)]
struct Posting {
    term_freq: HashMap<String, u32>,
    length: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct LexicalView {
    k1: f64,
    b: f64,
    docs: BTreeMap<IndexKey, Posting>,
    postings: HashMap<String, BTreeSet<IndexKey>>,
    total_length: u64,
}

impl LexicalView {
    pub(crate) fn new(k1: f64, b: f64) -> Self {
        Self {
            k1,
            b,
            docs: BTreeMap::new(),
            postings: HashMap::new(),
            total_length: 0,
        }
    }

    pub(crate) fn insert(&mut self, key: IndexKey, fact: &AtomicFact) {
        self.remove(&key);

        let mut term_freq: HashMap<String, u32> = HashMap::new();
        let mut length = 0;
        for term in tokenize(&fact.text) {
            *term_freq.entry(term).or_default() += 1;
            length += 1;
        }
        for term in fact.keywords.iter().flat_map(|k| tokenize(k)) {
            *term_freq.entry(term).or_default() += KEYWORD_BOOST;
            length += KEYWORD_BOOST;
        }

        for term in term_freq.keys() {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(key.clone());
        }
        self.total_length += u64::from(length);
        self.docs.insert(key, Posting { term_freq, length });
    }

    pub(crate) fn remove(&mut self, key: &IndexKey) -> bool {
        let Some(posting) = self.docs.remove(key) else {
            return false;
        };
        for term in posting.term_freq.keys() {
            if let Some(keys) = self.postings.get_mut(term) {
                keys.remove(key);
                if keys.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        self.total_length -= u64::from(posting.length);
        true
    }

    pub(crate) fn versions_of(&self, id: &FactId) -> Vec<u64> {
        super::versions_in(&self.docs, id)
    }

    pub(crate) fn len(&self) -> usize {
        self.docs.len()
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &IndexKey> {
        self.docs.keys()
    }

    /// BM25 `(k1, b)`.
    pub(crate) fn params(&self) -> (f64, f64) {
        (self.k1, self.b)
    }

    /// Top `k` documents by BM25 against the query terms; ties break on key order.
    pub(crate) fn search(&self, query: &str, k: usize) -> Vec<(IndexKey, f64)> {
        if k == 0 || self.docs.is_empty() {
            return Vec::new();
        }

        let mut terms = tokenize(query);
        terms.sort();
        terms.dedup();

        let n = self.docs.len() as f64;
        let avg_len = (self.total_length as f64 / n).max(1e-6);
        let mut scores: HashMap<&IndexKey, f64> = HashMap::new();

        for term in &terms {
            let Some(keys) = self.postings.get(term) else {
                continue;
            };
            let df = keys.len() as f64;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
            for key in keys {
                let Some(doc) = self.docs.get(key) else {
                    continue;
                };
                let tf = f64::from(doc.term_freq.get(term).copied().unwrap_or(0));
                let norm = self.k1 * (1.0 - self.b + self.b * f64::from(doc.length) / avg_len);
                *scores.entry(key).or_default() += idf * tf * (self.k1 + 1.0) / (tf + norm);
            }
        }

        let mut ranked: Vec<(IndexKey, f64)> = scores
            .into_iter()
            .filter(|(_, s)| *s > 0.0)
            .map(|(key, s)| (key.clone(), s))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(k);
        ranked
    }
}
