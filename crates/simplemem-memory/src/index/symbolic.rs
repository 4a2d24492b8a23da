// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Symbolic view: exact lookup by entity and overlap lookup by calendar day.
//!
//! A fact's time is kept as one inclusive day interval posted under its first
//! day, so a fact spanning years costs the same as one spanning an hour.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use regex::Regex;
use simplemem_core::types::{AtomicFact, FactId};

use super::IndexKey;
use crate::text::replace_phrase;

static DATE_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})(?:-(\d{2}))?").unwrap());

/// Structured constraints inferred from a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolicFilter {
    /// Case-folded entity names; a fact matches if it mentions any of them.
    pub entities: Vec<String>,
    /// Inclusive day range; a fact matches if any of its days falls inside.
    pub days: Option<(NaiveDate, NaiveDate)>,
}

impl SymbolicFilter {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.days.is_none()
    }
}

#[derive(Debug, Clone)]
struct SymbolicEntry {
    entities: Vec<String>,
    first_day: NaiveDate,
    last_day: NaiveDate,
    recency: NaiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SymbolicView {
    entries: BTreeMap<IndexKey, SymbolicEntry>,
    by_entity: HashMap<String, BTreeSet<IndexKey>>,
    by_first_day: BTreeMap<NaiveDate, BTreeSet<IndexKey>>,
    /// Longest interval ever inserted, in days. Never shrinks.
    widest_span: i64,
}

impl SymbolicView {
    pub(crate) fn insert(&mut self, key: IndexKey, fact: &AtomicFact) {
        self.remove(&key);

        let mut entities: Vec<String> = fact.entities.iter().map(|e| fold(e)).collect();
        entities.sort();
        entities.dedup();
        let (first_day, last_day) = match fact.time {
            Some(time) => time.day_span(),
            None => (fact.observed_at.date(), fact.observed_at.date()),
        };
        self.widest_span = self
            .widest_span
            .max((last_day - first_day).num_days());

        for entity in &entities {
            self.by_entity
                .entry(entity.clone())
                .or_default()
                .insert(key.clone());
        }
        self.by_first_day
            .entry(first_day)
            .or_default()
            .insert(key.clone());
        self.entries.insert(
            key,
            SymbolicEntry {
                entities,
                first_day,
                last_day,
                recency: fact.recency(),
            },
        );
    }

    pub(crate) fn remove(&mut self, key: &IndexKey) -> bool {
        let Some(entry) = self.entries.remove(key) else {
            return false;
        };
        for entity in &entry.entities {
            if let Some(keys) = self.by_entity.get_mut(entity) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_entity.remove(entity);
                }
            }
        }
        if let Some(keys) = self.by_first_day.get_mut(&entry.first_day) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_first_day.remove(&entry.first_day);
            }
        }
        true
    }

    pub(crate) fn versions_of(&self, id: &FactId) -> Vec<u64> {
        super::versions_in(&self.entries, id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &IndexKey> {
        self.entries.keys()
    }

    /// Known entities ordered by how many facts mention them, most first.
    pub(crate) fn entity_salience(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = self
            .by_entity
            .iter()
            .map(|(e, keys)| (e.clone(), keys.len()))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    /// Derive entity and date constraints from free query text.
    ///
    /// Entities are matched against names this view already knows. ISO dates
    /// (`2025-11-16`) become single days, months (`2025-11`) become whole-month
    /// ranges, and several mentions widen to the range covering all of them.
    pub(crate) fn infer_filter(&self, query: &str) -> SymbolicFilter {
        let mut entities: Vec<String> = self
            .by_entity
            .keys()
            .filter(|entity| replace_phrase(query, entity, "").1)
            .cloned()
            .collect();
        entities.sort();

        let mut bounds: Option<(NaiveDate, NaiveDate)> = None;
        for caps in DATE_MENTION.captures_iter(query) {
            let year: i32 = caps[1].parse().unwrap_or_default();
            let month: u32 = caps[2].parse().unwrap_or_default();
            let span = match caps.get(3) {
                Some(day) => day
                    .as_str()
                    .parse()
                    .ok()
                    .and_then(|d| NaiveDate::from_ymd_opt(year, month, d))
                    .map(|d| (d, d)),
                None => month_span(year, month),
            };
            if let Some((lo, hi)) = span {
                bounds = Some(match bounds {
                    Some((a, b)) => (a.min(lo), b.max(hi)),
                    None => (lo, hi),
                });
            }
        }

        SymbolicFilter {
            entities,
            days: bounds,
        }
    }

    /// Facts satisfying `filter`, most recent first, capped at `k`.
    ///
    /// With both constraints present a fact must satisfy both. An empty filter matches nothing.
    pub(crate) fn search(&self, filter: &SymbolicFilter, k: usize) -> Vec<IndexKey> {
        if k == 0 || filter.is_empty() {
            return Vec::new();
        }

        let by_entity: Option<BTreeSet<&IndexKey>> = (!filter.entities.is_empty()).then(|| {
            filter
                .entities
                .iter()
                .filter_map(|e| self.by_entity.get(&fold(e)))
                .flatten()
                .collect()
        });
        let by_day: Option<BTreeSet<&IndexKey>> =
            filter.days.map(|(lo, hi)| self.overlapping(lo, hi).collect());

        let candidates: Vec<&IndexKey> = match (by_entity, by_day) {
            (Some(e), Some(d)) => e.intersection(&d).copied().collect(),
            (Some(e), None) => e.into_iter().collect(),
            (None, Some(d)) => d.into_iter().collect(),
            (None, None) => Vec::new(),
        };

        let mut ranked: Vec<(&IndexKey, NaiveDateTime)> = candidates
            .into_iter()
            .filter_map(|key| self.entries.get(key).map(|e| (key, e.recency)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.into_iter().take(k).map(|(key, _)| key.clone()).collect()
    }
}

impl SymbolicView {
    /// Keys whose day interval intersects `lo..=hi`.
    fn overlapping(&self, lo: NaiveDate, hi: NaiveDate) -> impl Iterator<Item = &IndexKey> {
        // Nothing starting earlier than `lo - widest_span` can still reach `lo`.
        let earliest = TimeDelta::try_days(self.widest_span)
            .and_then(|span| lo.checked_sub_signed(span))
            .unwrap_or(NaiveDate::MIN);
        self.by_first_day
            .range(earliest..=hi.max(earliest))
            .flat_map(|(_, keys)| keys)
            .filter(move |key| self.entries.get(*key).is_some_and(|e| e.last_day >= lo))
    }
}

fn fold(entity: &str) -> String {
    entity.trim().to_lowercase()
}

fn month_span(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}
