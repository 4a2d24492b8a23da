// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic capability implementations for tests.
//!
//! None of these call out to a model. Each one can be switched off at runtime
//! to simulate an outage, and counts its calls so tests can assert how often
//! the pipeline reached it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use simplemem_core::types::{DialogueTurn, ExtractedProposition, ExtractionRequest};
use simplemem_core::{
    Capability, CapabilityError, CapabilityKind, ComplexityEstimator, EmbeddingAdapter,
    FactExtractor, HealthStatus, QualityFilter,
};

/// Embedding width used by [`HashEmbedder::default`] and the test harness.
pub const TEST_DIMENSIONS: usize = 64;

/// Availability switch and call counter shared by every fake.
#[derive(Debug)]
struct Switch {
    available: AtomicBool,
    calls: AtomicUsize,
}

impl Switch {
    fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    fn hit(&self, capability: CapabilityKind) -> Result<(), CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CapabilityError::Unavailable {
                capability,
                message: "switched off by test".into(),
            })
        }
    }

    fn health(&self) -> HealthStatus {
        if self.available.load(Ordering::SeqCst) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy("switched off by test".into())
        }
    }
}

macro_rules! switchable {
    ($ty:ty, $name:literal, $kind:expr) => {
        impl $ty {
            /// Make every later call fail (`false`) or succeed (`true`).
            pub fn set_available(&self, available: bool) {
                self.switch.available.store(available, Ordering::SeqCst);
            }

            /// Calls received so far, including failed ones.
            pub fn calls(&self) -> usize {
                self.switch.calls.load(Ordering::SeqCst)
            }
        }

        #[async_trait]
        impl Capability for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn kind(&self) -> CapabilityKind {
                $kind
            }

            async fn health_check(&self) -> Result<HealthStatus, CapabilityError> {
                Ok(self.switch.health())
            }
        }
    };
}

// --- Quality filter ---

/// Scores a turn by how many content words it has: one word scores 0,
/// `saturation` words or more score 1.
#[derive(Debug)]
pub struct HeuristicQualityFilter {
    saturation: usize,
    malformed: AtomicBool,
    switch: Switch,
}

impl HeuristicQualityFilter {
    pub fn new(saturation: usize) -> Self {
        Self {
            saturation: saturation.max(2),
            malformed: AtomicBool::new(false),
            switch: Switch::new(),
        }
    }

    /// Answer one score fewer than the window has turns.
    pub fn set_malformed(&self, malformed: bool) {
        self.malformed.store(malformed, Ordering::SeqCst);
    }

    fn score_one(&self, content: &str) -> f32 {
        let words = content
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1)
            .count();
        let span = (self.saturation - 1) as f32;
        (words.saturating_sub(1) as f32 / span).min(1.0)
    }
}

impl Default for HeuristicQualityFilter {
    fn default() -> Self {
        Self::new(6)
    }
}

switchable!(
    HeuristicQualityFilter,
    "heuristic-quality-filter",
    CapabilityKind::QualityFilter
);

#[async_trait]
impl QualityFilter for HeuristicQualityFilter {
    async fn score(&self, window: &[DialogueTurn]) -> Result<Vec<f32>, CapabilityError> {
        self.switch.hit(CapabilityKind::QualityFilter)?;
        let mut scores: Vec<f32> = window.iter().map(|t| self.score_one(&t.content)).collect();
        if self.malformed.load(Ordering::SeqCst) {
            scores.pop();
        }
        Ok(scores)
    }
}

// --- Extraction ---

/// Returns scripted propositions for known turn contents.
///
/// A turn without a script yields one proposition: its content verbatim with
/// the speaker as the only entity.
#[derive(Debug)]
pub struct ScriptedExtractor {
    scripts: HashMap<String, Vec<ExtractedProposition>>,
    failures: HashMap<String, bool>,
    switch: Switch,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            failures: HashMap::new(),
            switch: Switch::new(),
        }
    }

    /// Answer `propositions` for any turn whose content equals `content`.
    pub fn with_script(
        mut self,
        content: impl Into<String>,
        propositions: Vec<ExtractedProposition>,
    ) -> Self {
        self.scripts.insert(content.into(), propositions);
        self
    }

    /// Fail for the turn whose content equals `content`; `transient` picks
    /// between an outage and a malformed reply.
    pub fn failing_on(mut self, content: impl Into<String>, transient: bool) -> Self {
        self.failures.insert(content.into(), transient);
        self
    }
}

impl Default for ScriptedExtractor {
    fn default() -> Self {
        Self::new()
    }
}

switchable!(
    ScriptedExtractor,
    "scripted-extractor",
    CapabilityKind::Extraction
);

#[async_trait]
impl FactExtractor for ScriptedExtractor {
    async fn extract(
        &self,
        request: ExtractionRequest,
    ) -> Result<Vec<ExtractedProposition>, CapabilityError> {
        self.switch.hit(CapabilityKind::Extraction)?;
        let content = &request.turn.content;
        if let Some(&transient) = self.failures.get(content) {
            let message = format!("scripted failure for turn {}", request.turn.id);
            return Err(if transient {
                CapabilityError::Unavailable {
                    capability: CapabilityKind::Extraction,
                    message,
                }
            } else {
                CapabilityError::InvalidResponse {
                    capability: CapabilityKind::Extraction,
                    message,
                }
            });
        }
        if let Some(script) = self.scripts.get(content) {
            return Ok(script.clone());
        }
        let mut proposition = ExtractedProposition::new(content.clone());
        proposition.entities.push(request.turn.speaker.clone());
        Ok(vec![proposition])
    }
}

// --- Embeddings ---

/// Bag-of-words embedder: each lowercase token is hashed (FNV-1a) into one
/// of `dimensions` buckets and the counts are L2-normalized. Texts sharing
/// words get a positive cosine similarity.
#[derive(Debug)]
pub struct HashEmbedder {
    dimensions: usize,
    corrupt_on: Vec<String>,
    switch: Switch,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            corrupt_on: Vec::new(),
            switch: Switch::new(),
        }
    }

    /// Answer a NaN-filled vector for any text containing `phrase`.
    pub fn corrupting(mut self, phrase: impl Into<String>) -> Self {
        self.corrupt_on.push(phrase.into().to_lowercase());
        self
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        if self.corrupt_on.iter().any(|p| lowered.contains(p.as_str())) {
            return vec![f32::NAN; self.dimensions];
        }
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = fnv1a(&token.to_lowercase()) % self.dimensions as u64;
            vector[bucket as usize] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(TEST_DIMENSIONS)
    }
}

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

switchable!(HashEmbedder, "hash-embedder", CapabilityKind::Embedding);

#[async_trait]
impl EmbeddingAdapter for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, CapabilityError> {
        self.switch.hit(CapabilityKind::Embedding)?;
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

// --- Complexity ---

/// Always answers the same complexity.
#[derive(Debug)]
pub struct FixedComplexity {
    value: f32,
    switch: Switch,
}

impl FixedComplexity {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            switch: Switch::new(),
        }
    }
}

impl Default for FixedComplexity {
    fn default() -> Self {
        Self::new(0.0)
    }
}

switchable!(FixedComplexity, "fixed-complexity", CapabilityKind::Complexity);

#[async_trait]
impl ComplexityEstimator for FixedComplexity {
    async fn estimate(&self, _query: &str) -> Result<f32, CapabilityError> {
        self.switch.hit(CapabilityKind::Complexity)?;
        Ok(self.value)
    }
}
