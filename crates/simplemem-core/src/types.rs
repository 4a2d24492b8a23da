// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the buffer, compressor, store, index, and retriever.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::SimpleMemError;

/// Canonical rendering of absolute timestamps inside fact text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Sequence number of a buffered dialogue turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of an atomic fact across all of its versions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactId(pub String);

impl FactId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive range of source turn sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRange {
    pub first: u64,
    pub last: u64,
}

impl TurnRange {
    pub fn single(turn: u64) -> Self {
        Self {
            first: turn,
            last: turn,
        }
    }

    /// Smallest range covering every sequence number, or `None` for an empty input.
    pub fn covering(turns: impl IntoIterator<Item = u64>) -> Option<Self> {
        let mut iter = turns.into_iter();
        let first = iter.next()?;
        let (lo, hi) = iter.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        Some(Self { first: lo, last: hi })
    }

    pub fn len(&self) -> u64 {
        self.last - self.first + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for TurnRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.first, self.last)
    }
}

/// A dialogue turn as supplied by the caller, before timestamp resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnInput {
    pub speaker: String,
    pub content: String,
    pub timestamp: String,
}

impl TurnInput {
    pub fn new(
        speaker: impl Into<String>,
        content: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// A buffered dialogue turn with a resolved absolute timestamp. Immutable once buffered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub id: TurnId,
    pub speaker: String,
    pub content: String,
    pub timestamp: NaiveDateTime,
}

/// Whether every reference in a fact's canonical text was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Canonical text is context independent.
    Resolved,
    /// At least one pronoun or time expression could not be resolved.
    Unresolved,
}

impl Resolution {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Resolved => "resolved",
            Resolution::Unresolved => "unresolved",
        }
    }

    /// Parse from SQLite string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "unresolved" => Resolution::Unresolved,
            _ => Resolution::Resolved,
        }
    }
}

/// Absolute time a fact refers to: an instant, or a range when `end` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactTime {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
}

impl FactTime {
    pub fn instant(at: NaiveDateTime) -> Self {
        Self {
            start: at,
            end: None,
        }
    }

    /// Range between two instants, normalized so `start <= end`.
    pub fn range(a: NaiveDateTime, b: NaiveDateTime) -> Self {
        if a == b {
            return Self::instant(a);
        }
        Self {
            start: a.min(b),
            end: Some(a.max(b)),
        }
    }

    pub fn latest(&self) -> NaiveDateTime {
        self.end.unwrap_or(self.start)
    }

    /// First and last calendar day touched by this time, inclusive.
    pub fn day_span(&self) -> (NaiveDate, NaiveDate) {
        (self.start.date(), self.latest().date())
    }
}

/// A fact produced by compression, not yet assigned an identity or version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactDraft {
    pub text: String,
    pub source_turns: TurnRange,
    pub speakers: Vec<String>,
    pub entities: Vec<String>,
    pub keywords: Vec<String>,
    pub time: Option<FactTime>,
    /// Timestamp of the latest source turn.
    pub observed_at: NaiveDateTime,
    pub resolution: Resolution,
    pub unresolved_references: Vec<String>,
    pub correlation_key: Option<String>,
}

/// A stored, versioned, context-independent proposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicFact {
    pub id: FactId,
    /// Starts at 1 and increases by one for every correction.
    pub version: u64,
    /// Canonical text with references and relative times resolved.
    pub text: String,
    pub source_turns: TurnRange,
    pub speakers: Vec<String>,
    pub entities: Vec<String>,
    pub keywords: Vec<String>,
    pub time: Option<FactTime>,
    pub observed_at: NaiveDateTime,
    pub resolution: Resolution,
    pub unresolved_references: Vec<String>,
    pub correlation_key: Option<String>,
    /// Embedding of `text` (persisted so views can be rebuilt without re-embedding).
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// When version 1 of this fact was stored.
    pub created_at: DateTime<Utc>,
    /// When this version was stored.
    pub versioned_at: DateTime<Utc>,
}

impl AtomicFact {
    pub fn is_unresolved(&self) -> bool {
        self.resolution == Resolution::Unresolved
    }

    /// Most recent point in time this fact is about; used for recency ordering.
    pub fn recency(&self) -> NaiveDateTime {
        self.time.map(|t| t.latest()).unwrap_or(self.observed_at)
    }
}

/// The three projections maintained for every current fact version.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Semantic,
    Lexical,
    Symbolic,
}

impl ViewKind {
    /// All views in fusion order.
    pub const ALL: [ViewKind; 3] = [ViewKind::Semantic, ViewKind::Lexical, ViewKind::Symbolic];

    pub fn index(&self) -> usize {
        match self {
            ViewKind::Semantic => 0,
            ViewKind::Lexical => 1,
            ViewKind::Symbolic => 2,
        }
    }
}

/// 1-based rank of a fact in each view that returned it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRanks {
    pub semantic: Option<usize>,
    pub lexical: Option<usize>,
    pub symbolic: Option<usize>,
}

impl ViewRanks {
    pub fn get(&self, view: ViewKind) -> Option<usize> {
        match view {
            ViewKind::Semantic => self.semantic,
            ViewKind::Lexical => self.lexical,
            ViewKind::Symbolic => self.symbolic,
        }
    }

    pub fn set(&mut self, view: ViewKind, rank: usize) {
        match view {
            ViewKind::Semantic => self.semantic = Some(rank),
            ViewKind::Lexical => self.lexical = Some(rank),
            ViewKind::Symbolic => self.symbolic = Some(rank),
        }
    }
}

/// A retrieval request.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    /// Number of fused facts returned.
    pub k_base: usize,
    /// Replaces the complexity-scaled per-view depth when set (never below `k_base`).
    pub depth_override: Option<usize>,
    pub issued_at: DateTime<Utc>,
}

impl Query {
    pub fn new(text: impl Into<String>, k_base: usize) -> Self {
        Self {
            text: text.into(),
            k_base,
            depth_override: None,
            issued_at: Utc::now(),
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth_override = Some(depth);
        self
    }
}

/// One fused retrieval result.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalHit {
    pub fact: AtomicFact,
    pub score: f64,
    pub ranks: ViewRanks,
}

/// Ordered, fused answer to a query.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub query: String,
    pub hits: Vec<RetrievalHit>,
    /// Estimated query complexity in `[0, 1]`.
    pub complexity: f32,
    pub k_base: usize,
    /// Per-view search depth used before fusion.
    pub k_dyn: usize,
    /// Views that failed or were offline; non-empty means the result is partial.
    pub unavailable_views: Vec<ViewKind>,
}

impl RetrievalResult {
    pub fn is_partial(&self) -> bool {
        !self.unavailable_views.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Render hits as a compact context block, one `[time] speakers: fact` line each.
    pub fn render_context(&self) -> String {
        if self.hits.is_empty() {
            return String::from("No relevant memories found.\n");
        }

        let mut out = String::from("## Retrieved Memories\n");
        for hit in &self.hits {
            let fact = &hit.fact;
            let stamp = fact
                .time
                .map(|t| t.start)
                .unwrap_or(fact.observed_at)
                .format(TIMESTAMP_FORMAT);
            let speakers = fact.speakers.join(", ");
            out.push_str(&format!("- [{stamp}] {speakers}: {}", fact.text));
            if fact.is_unresolved() {
                out.push_str(" (unresolved)");
            }
            out.push('\n');
        }
        out
    }
}

/// Token accounting for one or more compressed windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionStats {
    pub turns_seen: usize,
    pub turns_filtered: usize,
    /// Whitespace tokens across all source turns.
    pub source_tokens: usize,
    /// Whitespace tokens across all produced canonical texts.
    pub canonical_tokens: usize,
}

impl CompressionStats {
    pub fn merge(&mut self, other: &CompressionStats) {
        self.turns_seen += other.turns_seen;
        self.turns_filtered += other.turns_filtered;
        self.source_tokens += other.source_tokens;
        self.canonical_tokens += other.canonical_tokens;
    }
}

/// A non-fatal error reported in a finalize summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedError {
    pub kind: String,
    pub message: String,
    pub turns: Option<TurnRange>,
}

impl From<&SimpleMemError> for ReportedError {
    fn from(err: &SimpleMemError) -> Self {
        let turns = match err {
            SimpleMemError::CompressionUnavailable { turns, .. } => Some(*turns),
            SimpleMemError::ExtractionPartialFailure { turn, .. } => Some(TurnRange::single(*turn)),
            _ => None,
        };
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            turns,
        }
    }
}

/// Outcome of a finalize call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeSummary {
    /// New facts stored (version 1).
    pub facts_created: usize,
    /// Existing facts that received a new version.
    pub facts_updated: usize,
    /// Facts of either kind flagged unresolved.
    pub facts_unresolved: usize,
    pub windows_processed: usize,
    /// Windows returned to the buffer for retry.
    pub windows_deferred: usize,
    /// Windows discarded after a failure that a retry would repeat.
    #[serde(default)]
    pub windows_dropped: usize,
    pub errors: Vec<ReportedError>,
    pub compression: CompressionStats,
}

/// Snapshot of system counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_turns_processed: u64,
    pub total_facts_stored: u64,
    pub buffered_turns: usize,
    pub last_finalized_at: Option<DateTime<Utc>>,
    pub database_path: String,
    pub indexed_facts: usize,
    pub quarantined_facts: usize,
}

/// Health status reported by capability health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Capability is fully operational.
    Healthy,
    /// Capability is operational but experiencing issues.
    Degraded(String),
    /// Capability is not operational.
    Unhealthy(String),
}

/// Identifies an external capability.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    QualityFilter,
    Extraction,
    Embedding,
    Complexity,
}

// --- Extraction capability payloads ---

/// Input for extracting propositions from one turn.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRequest {
    pub turn: DialogueTurn,
    /// Earlier surviving turns of the same window, oldest first.
    pub context: Vec<DialogueTurn>,
    /// Entities known so far, most salient first.
    pub known_entities: Vec<String>,
}

/// A reference in proposition text that names an entity indirectly ("he", "the manager").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Text as it appears in the proposition.
    pub surface: String,
    /// Entities the reference may denote. Empty means the resolver found none.
    #[serde(default)]
    pub candidates: Vec<String>,
}

/// A time expression found in proposition text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemporalExpression {
    /// Already absolute ("on 2025-11-20 at 09:00").
    Absolute { surface: String, at: NaiveDateTime },
    /// Relative to the turn's own timestamp ("tomorrow at 2pm" is `day_offset = 1, time = 14:00`).
    Relative {
        surface: String,
        day_offset: i64,
        #[serde(default)]
        time: Option<NaiveTime>,
    },
    /// Needs context outside the window to pin down ("next January" without a year anchor).
    Unanchored { surface: String },
}

impl TemporalExpression {
    pub fn surface(&self) -> &str {
        match self {
            TemporalExpression::Absolute { surface, .. }
            | TemporalExpression::Relative { surface, .. }
            | TemporalExpression::Unanchored { surface } => surface,
        }
    }
}

/// One independent proposition extracted from a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedProposition {
    pub text: String,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub temporals: Vec<TemporalExpression>,
    /// Other turns of the window this proposition draws on.
    #[serde(default)]
    pub supporting_turns: Vec<u64>,
    /// Identifies the fact this proposition corrects, if any.
    #[serde(default)]
    pub correlation_key: Option<String>,
}

impl ExtractedProposition {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
            keywords: Vec::new(),
            references: Vec::new(),
            temporals: Vec::new(),
            supporting_turns: Vec::new(),
            correlation_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn turn_range_covering() {
        assert_eq!(TurnRange::covering(Vec::<u64>::new()), None);
        let range = TurnRange::covering([5, 2, 9]).unwrap();
        assert_eq!(range, TurnRange { first: 2, last: 9 });
        assert_eq!(range.len(), 8);
        assert_eq!(range.to_string(), "2..=9");
    }

    #[test]
    fn resolution_variants() {
        assert_eq!(Resolution::Resolved.as_str(), "resolved");
        assert_eq!(Resolution::Unresolved.as_str(), "unresolved");
        assert_eq!(Resolution::from_str_value("unresolved"), Resolution::Unresolved);
        assert_eq!(Resolution::from_str_value("resolved"), Resolution::Resolved);
    }

    #[test]
    fn fact_time_range_normalizes() {
        let a = at("2025-11-16T14:00:00");
        let b = at("2025-11-14T09:00:00");
        let t = FactTime::range(a, b);
        assert_eq!(t.start, b);
        assert_eq!(t.end, Some(a));
        assert_eq!(t.latest(), a);
        assert_eq!(t.day_span(), (b.date(), a.date()));
        assert_eq!(FactTime::range(a, a), FactTime::instant(a));
    }

    #[test]
    fn view_kind_display_and_order() {
        assert_eq!(ViewKind::Semantic.to_string(), "semantic");
        assert_eq!(ViewKind::ALL.map(|v| v.index()), [0, 1, 2]);
        let parsed: ViewKind = "lexical".parse().unwrap();
        assert_eq!(parsed, ViewKind::Lexical);
    }

    #[test]
    fn view_ranks_get_set() {
        let mut ranks = ViewRanks::default();
        ranks.set(ViewKind::Lexical, 2);
        assert_eq!(ranks.get(ViewKind::Lexical), Some(2));
        assert_eq!(ranks.get(ViewKind::Semantic), None);
    }

    #[test]
    fn temporal_expression_deserializes_tagged() {
        let json = r#"[
            {"kind": "relative", "surface": "tomorrow at 2pm", "day_offset": 1, "time": "14:00:00"},
            {"kind": "unanchored", "surface": "next January"},
            {"kind": "absolute", "surface": "on Nov 20", "at": "2025-11-20T00:00:00"}
        ]"#;
        let parsed: Vec<TemporalExpression> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].surface(), "tomorrow at 2pm");
        assert!(matches!(
            parsed[0],
            TemporalExpression::Relative { day_offset: 1, time: Some(_), .. }
        ));
        assert!(matches!(parsed[1], TemporalExpression::Unanchored { .. }));
    }

    #[test]
    fn proposition_defaults_optional_fields() {
        let parsed: ExtractedProposition =
            serde_json::from_str(r#"{"text": "Bob will bring the report"}"#).unwrap();
        assert_eq!(parsed, ExtractedProposition::new("Bob will bring the report"));
    }

    #[test]
    fn reported_error_carries_turns() {
        let err = SimpleMemError::ExtractionPartialFailure {
            turn: 4,
            message: "boom".into(),
        };
        let reported = ReportedError::from(&err);
        assert_eq!(reported.kind, "extraction_partial_failure");
        assert_eq!(reported.turns, Some(TurnRange::single(4)));
    }

    #[test]
    fn compression_stats_merge() {
        let mut total = CompressionStats::default();
        total.merge(&CompressionStats {
            turns_seen: 3,
            turns_filtered: 1,
            source_tokens: 30,
            canonical_tokens: 12,
        });
        total.merge(&CompressionStats {
            turns_seen: 2,
            turns_filtered: 0,
            source_tokens: 10,
            canonical_tokens: 8,
        });
        assert_eq!(total.turns_seen, 5);
        assert_eq!(total.canonical_tokens, 20);
    }
}
