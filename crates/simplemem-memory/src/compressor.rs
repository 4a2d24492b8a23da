// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic compression of a dialogue window into fact drafts.
//!
//! A window passes through four stages:
//!
//! 1. quality filtering: low-information turns are dropped;
//! 2. extraction: each surviving turn becomes zero or more propositions;
//! 3. coreference: indirect references are replaced with entity names,
//!    ties broken by recency, then frequency, then name;
//! 4. temporal anchoring: relative times are resolved against the turn's
//!    own timestamp.
//!
//! Whatever cannot be resolved is kept in the text and the draft is flagged
//! [`Resolution::Unresolved`].

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use simplemem_config::model::CompressionConfig;
use simplemem_core::types::{
    CapabilityKind, CompressionStats, DialogueTurn, ExtractedProposition, ExtractionRequest,
    FactDraft, FactTime, Resolution, TemporalExpression, TurnRange,
};
use simplemem_core::{CapabilityError, FactExtractor, QualityFilter, SimpleMemError};
use tracing::{debug, warn};

use crate::capability::CapabilityInvoker;
use crate::text::{remaining_deictics, replace_phrase, token_count};
use crate::timestamp::format_timestamp;

/// Tunables for [`SemanticCompressor`].
#[derive(Debug, Clone)]
pub struct CompressorSettings {
    /// Turns scoring below this are dropped before extraction.
    pub quality_threshold: f32,
    /// Words that must not survive in canonical text.
    pub deictic_terms: Vec<String>,
}

impl From<&CompressionConfig> for CompressorSettings {
    fn from(config: &CompressionConfig) -> Self {
        Self {
            quality_threshold: config.quality_threshold,
            deictic_terms: config.deictic_terms.clone(),
        }
    }
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self::from(&CompressionConfig::default())
    }
}

/// Result of compressing one window.
#[derive(Debug, Default)]
pub struct WindowOutcome {
    pub drafts: Vec<FactDraft>,
    /// Per-turn failures; the rest of the window was still compressed.
    pub errors: Vec<SimpleMemError>,
    pub stats: CompressionStats,
}

pub struct SemanticCompressor {
    quality_filter: Arc<dyn QualityFilter>,
    extractor: Arc<dyn FactExtractor>,
    invoker: CapabilityInvoker,
    settings: CompressorSettings,
}

impl SemanticCompressor {
    pub fn new(
        quality_filter: Arc<dyn QualityFilter>,
        extractor: Arc<dyn FactExtractor>,
        invoker: CapabilityInvoker,
        settings: CompressorSettings,
    ) -> Self {
        Self {
            quality_filter,
            extractor,
            invoker,
            settings,
        }
    }

    /// Compress one window.
    ///
    /// `known_entities` seeds coreference with entities already stored, as
    /// `(name, mention count)`. Fails with `CompressionUnavailable` when the
    /// filter fails or the extractor cannot be reached. The error's
    /// [`SimpleMemError::is_retryable`] tells the caller whether to keep the window.
    pub async fn compress(
        &self,
        window: &[DialogueTurn],
        known_entities: &[(String, usize)],
    ) -> Result<WindowOutcome, SimpleMemError> {
        let Some(turns) = TurnRange::covering(window.iter().map(|t| t.id.0)) else {
            return Ok(WindowOutcome::default());
        };
        let unavailable = |source: CapabilityError| SimpleMemError::CompressionUnavailable {
            turns,
            source,
        };

        let mut stats = CompressionStats {
            turns_seen: window.len(),
            source_tokens: window.iter().map(|t| token_count(&t.content)).sum(),
            ..Default::default()
        };

        let filter = &self.quality_filter;
        let scores = self
            .invoker
            .invoke(CapabilityKind::QualityFilter, move || filter.score(window))
            .await
            .map_err(unavailable)?;
        if scores.len() != window.len() {
            return Err(unavailable(CapabilityError::InvalidResponse {
                capability: CapabilityKind::QualityFilter,
                message: format!("{} scores for {} turns", scores.len(), window.len()),
            }));
        }

        let survivors: Vec<&DialogueTurn> = window
            .iter()
            .zip(&scores)
            .filter(|(_, score)| **score >= self.settings.quality_threshold)
            .map(|(turn, _)| turn)
            .collect();
        stats.turns_filtered = window.len() - survivors.len();
        debug!(
            %turns,
            kept = survivors.len(),
            dropped = stats.turns_filtered,
            "quality filter applied"
        );

        let mut tracker = EntityTracker::seeded(known_entities);
        let mut drafts = Vec::new();
        let mut errors = Vec::new();

        for (i, turn) in survivors.iter().enumerate() {
            let request = ExtractionRequest {
                turn: (*turn).clone(),
                context: survivors[..i].iter().map(|t| (*t).clone()).collect(),
                known_entities: tracker.ranked(),
            };
            let extractor = &self.extractor;
            let extracted = self
                .invoker
                .invoke(CapabilityKind::Extraction, move || {
                    extractor.extract(request.clone())
                })
                .await;

            match extracted {
                Ok(propositions) => {
                    for proposition in propositions {
                        let draft = self.anchor(proposition, turn, window, &tracker);
                        for entity in &draft.entities {
                            tracker.observe(entity, turn.id.0);
                        }
                        drafts.push(draft);
                    }
                }
                Err(err) if err.is_transient() => return Err(unavailable(err)),
                Err(err) => {
                    warn!(turn = turn.id.0, error = %err, "extraction failed for turn");
                    errors.push(SimpleMemError::ExtractionPartialFailure {
                        turn: turn.id.0,
                        message: err.to_string(),
                    });
                }
            }
            tracker.observe(&turn.speaker, turn.id.0);
        }

        stats.canonical_tokens = drafts.iter().map(|d| token_count(&d.text)).sum();
        Ok(WindowOutcome {
            drafts,
            errors,
            stats,
        })
    }

    /// Resolve references and times in one proposition and build its draft.
    fn anchor(
        &self,
        proposition: ExtractedProposition,
        turn: &DialogueTurn,
        window: &[DialogueTurn],
        tracker: &EntityTracker,
    ) -> FactDraft {
        let mut text = proposition.text;
        let mut entities = proposition.entities;
        let mut unresolved: Vec<String> = Vec::new();

        for reference in &proposition.references {
            let Some(entity) = tracker.pick(&reference.candidates) else {
                unresolved.push(reference.surface.clone());
                continue;
            };
            let (rewritten, replaced) = replace_phrase(&text, &reference.surface, &entity);
            if replaced {
                text = rewritten;
                entities.push(entity);
            } else {
                debug!(surface = %reference.surface, "reference not found in proposition text");
            }
        }

        let mut times: Vec<FactTime> = Vec::new();
        for temporal in &proposition.temporals {
            match anchor_time(temporal, turn.timestamp) {
                Some((time, replacement)) => {
                    text = replace_phrase(&text, temporal.surface(), &replacement).0;
                    times.push(time);
                }
                None => unresolved.push(temporal.surface().to_string()),
            }
        }

        for term in remaining_deictics(&text, &self.settings.deictic_terms) {
            if !unresolved.iter().any(|u| u.eq_ignore_ascii_case(&term)) {
                unresolved.push(term);
            }
        }

        let sources: Vec<&DialogueTurn> = window
            .iter()
            .filter(|t| t.id == turn.id || proposition.supporting_turns.contains(&t.id.0))
            .collect();
        let source_turns = TurnRange::covering(sources.iter().map(|t| t.id.0))
            .unwrap_or(TurnRange::single(turn.id.0));
        let observed_at = sources
            .iter()
            .map(|t| t.timestamp)
            .max()
            .unwrap_or(turn.timestamp);
        let mut speakers: Vec<String> = Vec::new();
        for source in &sources {
            if !speakers.contains(&source.speaker) {
                speakers.push(source.speaker.clone());
            }
        }

        let time = times
            .iter()
            .map(|t| t.start)
            .min()
            .zip(times.iter().map(FactTime::latest).max())
            .map(|(start, end)| FactTime::range(start, end));

        FactDraft {
            text,
            source_turns,
            speakers,
            entities: dedup_folded(entities),
            keywords: dedup_folded(proposition.keywords),
            time,
            observed_at,
            resolution: if unresolved.is_empty() {
                Resolution::Resolved
            } else {
                Resolution::Unresolved
            },
            unresolved_references: unresolved,
            correlation_key: proposition.correlation_key,
        }
    }
}

/// Absolute time for a temporal expression and the text that replaces it.
fn anchor_time(
    temporal: &TemporalExpression,
    turn_time: NaiveDateTime,
) -> Option<(FactTime, String)> {
    match temporal {
        TemporalExpression::Absolute { at, .. } => {
            Some((FactTime::instant(*at), format!("on {}", format_timestamp(*at))))
        }
        TemporalExpression::Relative {
            day_offset, time, ..
        } => {
            let day = TimeDelta::try_days(*day_offset)
                .and_then(|offset| turn_time.date().checked_add_signed(offset))?;
            match time {
                Some(at) => {
                    let at = day.and_time(*at);
                    Some((FactTime::instant(at), format!("on {}", format_timestamp(at))))
                }
                None => {
                    let start = day.and_hms_opt(0, 0, 0)?;
                    let end = day.and_hms_opt(23, 59, 59)?;
                    Some((FactTime::range(start, end), format!("on {}", day.format("%Y-%m-%d"))))
                }
            }
        }
        TemporalExpression::Unanchored { .. } => None,
    }
}

/// Drop case-insensitive duplicates and blanks, keeping the first spelling.
fn dedup_folded(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim().to_string();
        if !item.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(&item)) {
            out.push(item);
        }
    }
    out
}

#[derive(Debug, Clone)]
struct Mention {
    name: String,
    last_turn: u64,
    count: usize,
}

/// Entities seen so far, for coreference tie-breaking.
#[derive(Debug, Default)]
struct EntityTracker {
    mentions: HashMap<String, Mention>,
}

impl EntityTracker {
    /// Seed with stored entities; they rank below anything seen in this window.
    fn seeded(known: &[(String, usize)]) -> Self {
        let mentions = known
            .iter()
            .map(|(name, count)| {
                (
                    name.to_lowercase(),
                    Mention {
                        name: name.clone(),
                        last_turn: 0,
                        count: *count,
                    },
                )
            })
            .collect();
        Self { mentions }
    }

    fn observe(&mut self, name: &str, turn: u64) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let mention = self
            .mentions
            .entry(name.to_lowercase())
            .or_insert_with(|| Mention {
                name: name.to_string(),
                last_turn: 0,
                count: 0,
            });
        mention.name = name.to_string();
        mention.last_turn = mention.last_turn.max(turn);
        mention.count += 1;
    }

    fn rank_key(&self, name: &str) -> (u64, usize) {
        self.mentions
            .get(&name.trim().to_lowercase())
            .map(|m| (m.last_turn, m.count))
            .unwrap_or((0, 0))
    }

    /// Best candidate: most recent mention, then most mentions, then name.
    fn pick(&self, candidates: &[String]) -> Option<String> {
        candidates
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .min_by_key(|c| {
                let (last_turn, count) = self.rank_key(c);
                (Reverse(last_turn), Reverse(count), c.to_lowercase())
            })
            .map(str::to_string)
    }

    /// All known entity names in pick order.
    fn ranked(&self) -> Vec<String> {
        let mut mentions: Vec<&Mention> = self.mentions.values().collect();
        mentions.sort_by_key(|m| (Reverse(m.last_turn), Reverse(m.count), m.name.to_lowercase()));
        mentions.into_iter().map(|m| m.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::NaiveTime;
    use simplemem_core::types::{Reference, TurnId, TIMESTAMP_FORMAT};
    use simplemem_core::Capability;

    use super::*;
    use crate::capability::RetryPolicy;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    fn turn(id: u64, speaker: &str, content: &str, ts: &str) -> DialogueTurn {
        DialogueTurn {
            id: TurnId(id),
            speaker: speaker.into(),
            content: content.into(),
            timestamp: at(ts),
        }
    }

    /// Scores turns by length; fails while `down` is set.
    struct LengthFilter {
        down: bool,
    }

    impl Capability for LengthFilter {
        fn name(&self) -> &str {
            "length"
        }
        fn kind(&self) -> CapabilityKind {
            CapabilityKind::QualityFilter
        }
    }

    #[async_trait]
    impl QualityFilter for LengthFilter {
        async fn score(&self, window: &[DialogueTurn]) -> Result<Vec<f32>, CapabilityError> {
            if self.down {
                return Err(CapabilityError::Unavailable {
                    capability: CapabilityKind::QualityFilter,
                    message: "offline".into(),
                });
            }
            Ok(window
                .iter()
                .map(|t| if t.content.split_whitespace().count() > 1 { 1.0 } else { 0.0 })
                .collect())
        }
    }

    /// Replays scripted results keyed by turn id and records requests.
    #[derive(Default)]
    struct Script {
        results: HashMap<u64, Result<Vec<ExtractedProposition>, CapabilityError>>,
        seen: Mutex<Vec<ExtractionRequest>>,
    }

    impl Capability for Script {
        fn name(&self) -> &str {
            "script"
        }
        fn kind(&self) -> CapabilityKind {
            CapabilityKind::Extraction
        }
    }

    #[async_trait]
    impl FactExtractor for Script {
        async fn extract(
            &self,
            request: ExtractionRequest,
        ) -> Result<Vec<ExtractedProposition>, CapabilityError> {
            let id = request.turn.id.0;
            self.seen.lock().unwrap().push(request);
            self.results.get(&id).cloned().unwrap_or(Ok(Vec::new()))
        }
    }

    fn compressor(filter: LengthFilter, script: Arc<Script>) -> SemanticCompressor {
        SemanticCompressor::new(
            Arc::new(filter),
            script,
            CapabilityInvoker::new(RetryPolicy::no_retry(Duration::from_secs(1))),
            CompressorSettings::default(),
        )
    }

    fn meeting() -> ExtractedProposition {
        ExtractedProposition {
            entities: vec!["Alice".into(), "Bob".into(), "Starbucks".into()],
            references: vec![Reference {
                surface: "you".into(),
                candidates: vec!["Bob".into()],
            }],
            temporals: vec![TemporalExpression::Relative {
                surface: "tomorrow at 2pm".into(),
                day_offset: 1,
                time: NaiveTime::from_hms_opt(14, 0, 0),
            }],
            ..ExtractedProposition::new("Alice will meet you at Starbucks tomorrow at 2pm")
        }
    }

    #[tokio::test]
    async fn resolves_references_and_relative_time() {
        let mut script = Script::default();
        script.results.insert(1, Ok(vec![meeting()]));
        let compressor = compressor(LengthFilter { down: false }, Arc::new(script));

        let window = vec![
            turn(1, "Alice", "Bob, let's meet at Starbucks tomorrow at 2pm", "2025-11-15T14:30:00"),
            turn(2, "Bob", "Sure", "2025-11-15T14:31:00"),
        ];
        let outcome = compressor.compress(&window, &[]).await.unwrap();

        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.stats.turns_seen, 2);
        assert_eq!(outcome.stats.turns_filtered, 1);
        assert_eq!(outcome.drafts.len(), 1);
        let draft = &outcome.drafts[0];
        assert_eq!(
            draft.text,
            "Alice will meet Bob at Starbucks on 2025-11-16T14:00:00"
        );
        assert_eq!(draft.resolution, Resolution::Resolved);
        assert_eq!(draft.time, Some(FactTime::instant(at("2025-11-16T14:00:00"))));
        assert_eq!(draft.speakers, vec!["Alice"]);
        assert_eq!(draft.source_turns, TurnRange::single(1));
    }

    #[tokio::test]
    async fn unanchored_time_is_flagged() {
        let mut script = Script::default();
        script.results.insert(
            1,
            Ok(vec![ExtractedProposition {
                temporals: vec![TemporalExpression::Unanchored {
                    surface: "next January".into(),
                }],
                ..ExtractedProposition::new("Alice will visit Paris next January")
            }]),
        );
        let compressor = compressor(LengthFilter { down: false }, Arc::new(script));
        let window = vec![turn(1, "Alice", "I will visit Paris next January", "2025-11-15T10:00:00")];

        let outcome = compressor.compress(&window, &[]).await.unwrap();
        let draft = &outcome.drafts[0];
        assert_eq!(draft.resolution, Resolution::Unresolved);
        assert_eq!(draft.unresolved_references, vec!["next January"]);
        assert!(draft.text.contains("next January"));
        assert_eq!(draft.time, None);
    }

    #[tokio::test]
    async fn leftover_deictic_is_flagged() {
        let mut script = Script::default();
        script.results.insert(
            1,
            Ok(vec![ExtractedProposition::new("He moved to Berlin yesterday")]),
        );
        let compressor = compressor(LengthFilter { down: false }, Arc::new(script));
        let window = vec![turn(1, "Alice", "He moved to Berlin yesterday", "2025-11-15T10:00:00")];

        let draft = &compressor.compress(&window, &[]).await.unwrap().drafts[0];
        assert_eq!(draft.resolution, Resolution::Unresolved);
        assert_eq!(draft.unresolved_references, vec!["he", "yesterday"]);
    }

    #[tokio::test]
    async fn whole_day_offset_becomes_range() {
        let mut script = Script::default();
        script.results.insert(
            1,
            Ok(vec![ExtractedProposition {
                temporals: vec![TemporalExpression::Relative {
                    surface: "yesterday".into(),
                    day_offset: -1,
                    time: None,
                }],
                ..ExtractedProposition::new("Alice ran a marathon yesterday")
            }]),
        );
        let compressor = compressor(LengthFilter { down: false }, Arc::new(script));
        let window = vec![turn(1, "Alice", "I ran a marathon yesterday", "2025-11-15T10:00:00")];

        let draft = &compressor.compress(&window, &[]).await.unwrap().drafts[0];
        assert_eq!(draft.text, "Alice ran a marathon on 2025-11-14");
        assert_eq!(
            draft.time,
            Some(FactTime::range(at("2025-11-14T00:00:00"), at("2025-11-14T23:59:59")))
        );
        assert_eq!(draft.resolution, Resolution::Resolved);
    }

    #[tokio::test]
    async fn filter_outage_fails_whole_window() {
        let compressor = compressor(LengthFilter { down: true }, Arc::new(Script::default()));
        let window = vec![
            turn(3, "Alice", "hello there", "2025-11-15T10:00:00"),
            turn(4, "Bob", "hi again", "2025-11-15T10:01:00"),
        ];
        let err = compressor.compress(&window, &[]).await.unwrap_err();
        match err {
            SimpleMemError::CompressionUnavailable { turns, .. } => {
                assert_eq!(turns, TurnRange { first: 3, last: 4 });
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Returns one score too few.
    struct ShortFilter;

    impl Capability for ShortFilter {
        fn name(&self) -> &str {
            "short"
        }
        fn kind(&self) -> CapabilityKind {
            CapabilityKind::QualityFilter
        }
    }

    #[async_trait]
    impl QualityFilter for ShortFilter {
        async fn score(&self, window: &[DialogueTurn]) -> Result<Vec<f32>, CapabilityError> {
            Ok(vec![1.0; window.len().saturating_sub(1)])
        }
    }

    #[tokio::test]
    async fn malformed_scores_are_not_retryable() {
        let short = SemanticCompressor::new(
            Arc::new(ShortFilter),
            Arc::new(Script::default()),
            CapabilityInvoker::new(RetryPolicy::no_retry(Duration::from_secs(1))),
            CompressorSettings::default(),
        );
        let window = vec![
            turn(1, "Alice", "hello there", "2025-11-15T10:00:00"),
            turn(2, "Bob", "hi again", "2025-11-15T10:01:00"),
        ];
        let err = short.compress(&window, &[]).await.unwrap_err();
        assert!(matches!(err, SimpleMemError::CompressionUnavailable { .. }));
        assert!(!err.is_retryable());

        let outage = compressor(LengthFilter { down: true }, Arc::new(Script::default()));
        assert!(outage.compress(&window, &[]).await.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn bad_extraction_skips_only_that_turn() {
        let mut script = Script::default();
        script.results.insert(
            1,
            Err(CapabilityError::InvalidResponse {
                capability: CapabilityKind::Extraction,
                message: "not json".into(),
            }),
        );
        script
            .results
            .insert(2, Ok(vec![ExtractedProposition::new("Bob likes green tea")]));
        let compressor = compressor(LengthFilter { down: false }, Arc::new(script));
        let window = vec![
            turn(1, "Alice", "garbled garbled", "2025-11-15T10:00:00"),
            turn(2, "Bob", "I like green tea", "2025-11-15T10:01:00"),
        ];

        let outcome = compressor.compress(&window, &[]).await.unwrap();
        assert_eq!(outcome.drafts.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            outcome.errors[0],
            SimpleMemError::ExtractionPartialFailure { turn: 1, .. }
        ));
    }

    #[tokio::test]
    async fn extraction_sees_earlier_turns_as_context() {
        let script = Arc::new(Script::default());
        let compressor = compressor(LengthFilter { down: false }, Arc::clone(&script));
        let window = vec![
            turn(1, "Alice", "first message", "2025-11-15T10:00:00"),
            turn(2, "Bob", "second message", "2025-11-15T10:01:00"),
        ];
        compressor.compress(&window, &[("Carol".into(), 3)]).await.unwrap();

        let seen = script.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].context.is_empty());
        assert_eq!(seen[0].known_entities, vec!["Carol"]);
        assert_eq!(seen[1].context.len(), 1);
        assert_eq!(seen[1].known_entities, vec!["Alice", "Carol"]);
    }

    #[test]
    fn tie_break_is_recency_then_frequency_then_name() {
        let mut tracker = EntityTracker::seeded(&[("Zoe".into(), 9)]);
        tracker.observe("Alice", 1);
        tracker.observe("Bob", 2);
        let candidates: Vec<String> = vec!["Alice".into(), "Bob".into(), "Zoe".into()];
        assert_eq!(tracker.pick(&candidates).as_deref(), Some("Bob"));

        tracker.observe("Alice", 2);
        assert_eq!(tracker.pick(&candidates).as_deref(), Some("Alice"));

        let mut tied = EntityTracker::default();
        tied.observe("Mia", 5);
        tied.observe("Lea", 5);
        assert_eq!(
            tied.pick(&["Mia".to_string(), "Lea".to_string()]).as_deref(),
            Some("Lea")
        );
        assert_eq!(tracker.pick(&[]), None);
    }

    #[test]
    fn stored_entities_break_ties_by_frequency() {
        let tracker = EntityTracker::seeded(&[("Alice".into(), 2), ("Bob".into(), 5)]);
        let pick = tracker.pick(&["Alice".to_string(), "Bob".to_string()]);
        assert_eq!(pick.as_deref(), Some("Bob"));
    }
}
