// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reciprocal Rank Fusion of per-view ranked lists.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use simplemem_core::types::{ViewKind, ViewRanks};

/// One fused entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Fused<K> {
    pub key: K,
    /// `Σ 1 / (rank + c)` over the views that returned the key.
    pub score: f64,
    pub ranks: ViewRanks,
}

/// Fuse ranked lists by `Σ 1/(rank + c)` with 1-based ranks.
///
/// A key listed twice by one view counts at its best rank. Output is sorted
/// by score, then by `recency` (most recent first, unknown last), then by
/// key, so equal inputs always fuse to the same order regardless of the
/// order the lists are supplied in.
pub fn reciprocal_rank_fusion<K, F>(
    lists: &[(ViewKind, Vec<K>)],
    c: f64,
    recency: F,
) -> Vec<Fused<K>>
where
    K: Clone + Ord,
    F: Fn(&K) -> Option<NaiveDateTime>,
{
    let mut ranks: BTreeMap<K, ViewRanks> = BTreeMap::new();
    for (view, keys) in lists {
        for (i, key) in keys.iter().enumerate() {
            let entry = ranks.entry(key.clone()).or_default();
            if entry.get(*view).is_none() {
                entry.set(*view, i + 1);
            }
        }
    }

    let mut fused: Vec<(Fused<K>, Option<NaiveDateTime>)> = ranks
        .into_iter()
        .map(|(key, ranks)| {
            // Summed in a fixed view order so float rounding never depends on input order.
            let score: f64 = ViewKind::ALL
                .iter()
                .filter_map(|view| ranks.get(*view))
                .map(|rank| 1.0 / (rank as f64 + c))
                .sum();
            let at = recency(&key);
            (Fused { key, score, ranks }, at)
        })
        .collect();

    fused.sort_by(|(a, a_at), (b, b_at)| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b_at.cmp(a_at))
            .then_with(|| a.key.cmp(&b.key))
    });
    fused.into_iter().map(|(f, _)| f).collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use proptest::prelude::*;

    use super::*;

    fn day(d: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2025, 11, d).and_then(|d| d.and_hms_opt(12, 0, 0))
    }

    #[test]
    fn agreement_across_views_wins() {
        let lists = vec![
            (ViewKind::Semantic, vec!["a", "b", "c"]),
            (ViewKind::Lexical, vec!["b", "a"]),
            (ViewKind::Symbolic, vec!["b"]),
        ];
        let fused = reciprocal_rank_fusion(&lists, 60.0, |_| None);
        let keys: Vec<&str> = fused.iter().map(|f| f.key).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);

        let b = &fused[0];
        assert_eq!(b.ranks.get(ViewKind::Semantic), Some(2));
        assert_eq!(b.ranks.get(ViewKind::Lexical), Some(1));
        assert_eq!(b.ranks.get(ViewKind::Symbolic), Some(1));
        let expected = 1.0 / 62.0 + 1.0 / 61.0 + 1.0 / 61.0;
        assert!((b.score - expected).abs() < 1e-12);
        assert_eq!(fused[2].ranks.get(ViewKind::Lexical), None);
    }

    #[test]
    fn ties_prefer_recent_then_key() {
        let lists = vec![
            (ViewKind::Semantic, vec!["x"]),
            (ViewKind::Lexical, vec!["y"]),
            (ViewKind::Symbolic, vec!["z"]),
        ];
        let recency = |k: &&str| match *k {
            "x" => day(1),
            "y" => day(3),
            _ => day(1),
        };
        let fused = reciprocal_rank_fusion(&lists, 60.0, recency);
        let keys: Vec<&str> = fused.iter().map(|f| f.key).collect();
        assert_eq!(keys, vec!["y", "x", "z"]);
    }

    #[test]
    fn duplicate_key_counts_once_per_view() {
        let lists = vec![(ViewKind::Lexical, vec!["a", "a", "b"])];
        let fused = reciprocal_rank_fusion(&lists, 60.0, |_| None);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].ranks.get(ViewKind::Lexical), Some(1));
        assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn empty_lists_fuse_to_nothing() {
        let lists: Vec<(ViewKind, Vec<u32>)> = vec![(ViewKind::Semantic, vec![])];
        assert!(reciprocal_rank_fusion(&lists, 60.0, |_| None).is_empty());
    }

    fn ranked_list() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(0u8..20, 0..12)
    }

    proptest! {
        #[test]
        fn fusion_is_deterministic_and_order_independent(
            sem in ranked_list(),
            lex in ranked_list(),
            sym in ranked_list(),
        ) {
            let recency = |k: &u8| day(u32::from(*k % 5) + 1);
            let forward = vec![
                (ViewKind::Semantic, sem.clone()),
                (ViewKind::Lexical, lex.clone()),
                (ViewKind::Symbolic, sym.clone()),
            ];
            let backward = vec![
                (ViewKind::Symbolic, sym),
                (ViewKind::Lexical, lex),
                (ViewKind::Semantic, sem),
            ];

            let a = reciprocal_rank_fusion(&forward, 60.0, recency);
            let b = reciprocal_rank_fusion(&forward, 60.0, recency);
            let c = reciprocal_rank_fusion(&backward, 60.0, recency);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(&a, &c);

            for pair in a.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
            for f in &a {
                prop_assert!(f.score > 0.0 && f.score <= 3.0 / 61.0 + 1e-12);
            }
        }
    }
}
