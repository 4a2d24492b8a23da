// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible adapters for the four SimpleMem capabilities.
//!
//! Quality filtering, extraction and complexity estimation go through the
//! chat completions endpoint in JSON mode; embeddings use the embeddings
//! endpoint. Any server speaking the same API (vLLM, Ollama, LiteLLM) works
//! by pointing `openai.base_url` at it.

pub mod client;
pub mod prompts;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use simplemem_config::SimpleMemConfig;
use simplemem_core::types::{DialogueTurn, ExtractedProposition, ExtractionRequest};
use simplemem_core::{
    Capability, CapabilityError, CapabilityKind, ComplexityEstimator, EmbeddingAdapter,
    FactExtractor, QualityFilter, SimpleMemError,
};
use tracing::info;

use crate::client::OpenAiClient;

/// Resolve the API key: config value first, then `OPENAI_API_KEY`.
pub fn resolve_api_key(configured: Option<&str>) -> Result<String, SimpleMemError> {
    if let Some(key) = configured.filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            SimpleMemError::Config(
                "no API key: set openai.api_key, SIMPLEMEM_OPENAI_API_KEY or OPENAI_API_KEY"
                    .into(),
            )
        })
}

/// All four capabilities sharing one HTTP client.
pub struct OpenAiCapabilities {
    pub quality_filter: Arc<OpenAiQualityFilter>,
    pub extractor: Arc<OpenAiExtractor>,
    pub embedder: Arc<OpenAiEmbedder>,
    pub complexity: Arc<OpenAiComplexityEstimator>,
}

impl OpenAiCapabilities {
    pub fn from_config(config: &SimpleMemConfig) -> Result<Self, SimpleMemError> {
        let api_key = resolve_api_key(config.openai.api_key.as_deref())?;
        let client = OpenAiClient::new(&api_key, &config.openai)?;
        info!(
            base_url = %config.openai.base_url,
            chat_model = client.chat_model(),
            embedding_model = client.embedding_model(),
            "OpenAI-compatible capabilities initialized"
        );
        Ok(Self::with_client(client, config.index.embedding_dimensions))
    }

    pub fn with_client(client: OpenAiClient, dimensions: usize) -> Self {
        Self {
            quality_filter: Arc::new(OpenAiQualityFilter {
                client: client.clone(),
            }),
            extractor: Arc::new(OpenAiExtractor {
                client: client.clone(),
            }),
            embedder: Arc::new(OpenAiEmbedder {
                client: client.clone(),
                dimensions,
            }),
            complexity: Arc::new(OpenAiComplexityEstimator { client }),
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(
    capability: CapabilityKind,
    value: serde_json::Value,
) -> Result<T, CapabilityError> {
    serde_json::from_value(value).map_err(|e| CapabilityError::InvalidResponse {
        capability,
        message: format!("unexpected reply shape: {e}"),
    })
}

// --- Quality filter ---

pub struct OpenAiQualityFilter {
    client: OpenAiClient,
}

#[derive(Deserialize)]
struct ScoresReply {
    scores: Vec<f32>,
}

impl Capability for OpenAiQualityFilter {
    fn name(&self) -> &str {
        "openai-quality-filter"
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::QualityFilter
    }
}

#[async_trait]
impl QualityFilter for OpenAiQualityFilter {
    async fn score(&self, window: &[DialogueTurn]) -> Result<Vec<f32>, CapabilityError> {
        let kind = CapabilityKind::QualityFilter;
        let reply = self
            .client
            .chat_json(kind, prompts::QUALITY_SYSTEM, prompts::quality_user(window))
            .await?;
        let ScoresReply { scores } = decode(kind, reply)?;
        if scores.len() != window.len() {
            return Err(CapabilityError::InvalidResponse {
                capability: kind,
                message: format!("{} scores for {} turns", scores.len(), window.len()),
            });
        }
        Ok(scores.into_iter().map(|s| s.clamp(0.0, 1.0)).collect())
    }
}

// --- Extraction ---

pub struct OpenAiExtractor {
    client: OpenAiClient,
}

#[derive(Deserialize)]
struct PropositionsReply {
    #[serde(default)]
    propositions: Vec<ExtractedProposition>,
}

impl Capability for OpenAiExtractor {
    fn name(&self) -> &str {
        "openai-extractor"
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Extraction
    }
}

#[async_trait]
impl FactExtractor for OpenAiExtractor {
    async fn extract(
        &self,
        request: ExtractionRequest,
    ) -> Result<Vec<ExtractedProposition>, CapabilityError> {
        let kind = CapabilityKind::Extraction;
        let reply = self
            .client
            .chat_json(
                kind,
                prompts::EXTRACTION_SYSTEM,
                prompts::extraction_user(&request),
            )
            .await?;
        let PropositionsReply { propositions } = decode(kind, reply)?;
        Ok(propositions
            .into_iter()
            .filter(|p| !p.text.trim().is_empty())
            .collect())
    }
}

// --- Embeddings ---

pub struct OpenAiEmbedder {
    client: OpenAiClient,
    dimensions: usize,
}

impl Capability for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai-embedder"
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Embedding
    }
}

#[async_trait]
impl EmbeddingAdapter for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, CapabilityError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.client.embed(texts, Some(self.dimensions)).await?;
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(CapabilityError::InvalidResponse {
                capability: CapabilityKind::Embedding,
                message: format!(
                    "embedding has {} dimensions, expected {}",
                    bad.len(),
                    self.dimensions
                ),
            });
        }
        Ok(vectors)
    }
}

// --- Complexity ---

pub struct OpenAiComplexityEstimator {
    client: OpenAiClient,
}

#[derive(Deserialize)]
struct ComplexityReply {
    complexity: f32,
}

impl Capability for OpenAiComplexityEstimator {
    fn name(&self) -> &str {
        "openai-complexity"
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Complexity
    }
}

#[async_trait]
impl ComplexityEstimator for OpenAiComplexityEstimator {
    async fn estimate(&self, query: &str) -> Result<f32, CapabilityError> {
        let kind = CapabilityKind::Complexity;
        let reply = self
            .client
            .chat_json(kind, prompts::COMPLEXITY_SYSTEM, prompts::complexity_user(query))
            .await?;
        let ComplexityReply { complexity } = decode(kind, reply)?;
        Ok(complexity)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDateTime, NaiveTime};
    use simplemem_config::model::OpenAiConfig;
    use simplemem_core::types::{TemporalExpression, TurnId};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn caps(server: &MockServer, dimensions: usize) -> OpenAiCapabilities {
        let config = OpenAiConfig {
            base_url: server.uri(),
            ..OpenAiConfig::default()
        };
        OpenAiCapabilities::with_client(OpenAiClient::new("k", &config).unwrap(), dimensions)
    }

    async fn reply_with(server: &MockServer, content: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": content.to_string()}}]
            })))
            .mount(server)
            .await;
    }

    fn turn(id: u64, content: &str) -> DialogueTurn {
        DialogueTurn {
            id: TurnId(id),
            speaker: "Alice".into(),
            content: content.into(),
            timestamp: NaiveDateTime::parse_from_str("2025-11-15T14:30:00", "%Y-%m-%dT%H:%M:%S")
                .unwrap(),
        }
    }

    #[test]
    fn configured_key_wins() {
        assert_eq!(resolve_api_key(Some("sk-test")).unwrap(), "sk-test");
    }

    #[tokio::test]
    async fn quality_scores_are_clamped() {
        let server = MockServer::start().await;
        reply_with(&server, serde_json::json!({"scores": [1.4, -0.2]})).await;
        let scores = caps(&server, 2)
            .quality_filter
            .score(&[turn(1, "hi"), turn(2, "I moved to Berlin")])
            .await
            .unwrap();
        assert_eq!(scores, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn quality_score_count_must_match() {
        let server = MockServer::start().await;
        reply_with(&server, serde_json::json!({"scores": [0.5]})).await;
        let err = caps(&server, 2)
            .quality_filter
            .score(&[turn(1, "a b"), turn(2, "c d")])
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn extraction_parses_references_and_temporals() {
        let server = MockServer::start().await;
        reply_with(
            &server,
            serde_json::json!({"propositions": [{
                "text": "Alice will meet you at Starbucks tomorrow at 2pm",
                "entities": ["Alice", "Starbucks"],
                "references": [{"surface": "you", "candidates": ["Bob"]}],
                "temporals": [{
                    "kind": "relative",
                    "surface": "tomorrow at 2pm",
                    "day_offset": 1,
                    "time": "14:00:00"
                }],
                "correlation_key": null
            }, {"text": "  "}]}),
        )
        .await;

        let request = ExtractionRequest {
            turn: turn(1, "Bob, let's meet at Starbucks tomorrow at 2pm"),
            context: vec![],
            known_entities: vec![],
        };
        let props = caps(&server, 2).extractor.extract(request).await.unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].references[0].candidates, vec!["Bob"]);
        assert_eq!(
            props[0].temporals[0],
            TemporalExpression::Relative {
                surface: "tomorrow at 2pm".into(),
                day_offset: 1,
                time: NaiveTime::from_hms_opt(14, 0, 0),
            }
        );
    }

    #[tokio::test]
    async fn malformed_extraction_is_permanent() {
        let server = MockServer::start().await;
        reply_with(&server, serde_json::json!({"propositions": "nope"})).await;
        let request = ExtractionRequest {
            turn: turn(1, "x y"),
            context: vec![],
            known_entities: vec![],
        };
        let err = caps(&server, 2).extractor.extract(request).await.unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn embedding_dimension_is_checked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [0.1, 0.2, 0.3]}]
            })))
            .mount(&server)
            .await;
        let err = caps(&server, 2)
            .embedder
            .embed(vec!["hello".into()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expected 2"), "got: {err}");
    }

    #[tokio::test]
    async fn complexity_is_read_from_reply() {
        let server = MockServer::start().await;
        reply_with(&server, serde_json::json!({"complexity": 0.75})).await;
        let c = caps(&server, 2)
            .complexity
            .estimate("When did Alice move to Berlin and why?")
            .await
            .unwrap();
        assert!((c - 0.75).abs() < f32::EPSILON);
    }
}
