// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible chat completion and embedding endpoints.
//!
//! The client makes exactly one request per call. Deadlines and retries are
//! applied by the caller's capability invoker; this layer only classifies
//! failures as transient (`Unavailable`) or permanent (`InvalidResponse`).

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use simplemem_config::model::OpenAiConfig;
use simplemem_core::{CapabilityError, CapabilityKind, SimpleMemError};
use tracing::debug;

use crate::types::{
    ApiErrorResponse, ChatMessage, ChatRequest, ChatResponse, EmbeddingRequest,
    EmbeddingResponse, ResponseFormat,
};

/// Upper bound on a single HTTP exchange, independent of the capability deadline.
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(api_key: &str, config: &OpenAiConfig) -> Result<Self, SimpleMemError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| SimpleMemError::Config(format!("invalid API key header value: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| SimpleMemError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Run one chat completion and parse the reply as a JSON object.
    pub async fn chat_json(
        &self,
        capability: CapabilityKind,
        system: &str,
        user: String,
    ) -> Result<serde_json::Value, CapabilityError> {
        let request = ChatRequest {
            model: self.chat_model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: self.temperature,
            response_format: Some(ResponseFormat::json_object()),
        };
        let response: ChatResponse = self
            .post(capability, "chat/completions", &request)
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| invalid(capability, "response has no choices".into()))?;
        serde_json::from_str(strip_code_fence(&content))
            .map_err(|e| invalid(capability, format!("reply is not JSON: {e}")))
    }

    /// Embed `texts`, returning vectors in input order.
    pub async fn embed(
        &self,
        texts: Vec<String>,
        dimensions: Option<usize>,
    ) -> Result<Vec<Vec<f32>>, CapabilityError> {
        let expected = texts.len();
        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: texts,
            dimensions,
        };
        let mut response: EmbeddingResponse = self
            .post(CapabilityKind::Embedding, "embeddings", &request)
            .await?;

        if response.data.len() != expected {
            return Err(invalid(
                CapabilityKind::Embedding,
                format!("{} embeddings for {expected} inputs", response.data.len()),
            ));
        }
        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        capability: CapabilityKind,
        endpoint: &str,
        body: &B,
    ) -> Result<R, CapabilityError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| CapabilityError::Unavailable {
                capability,
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        debug!(%capability, %status, endpoint, "response received");

        if status.is_success() {
            let text = response.text().await.map_err(|e| CapabilityError::Unavailable {
                capability,
                message: format!("failed to read response body: {e}"),
            })?;
            return serde_json::from_str(&text)
                .map_err(|e| invalid(capability, format!("failed to parse API response: {e}")));
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api) => match api.error.error_type {
                Some(kind) => format!("API error {status} ({kind}): {}", api.error.message),
                None => format!("API error {status}: {}", api.error.message),
            },
            Err(_) => format!("API returned {status}: {body}"),
        };
        if is_transient_status(status) {
            Err(CapabilityError::Unavailable {
                capability,
                message,
            })
        } else {
            Err(invalid(capability, message))
        }
    }
}

fn invalid(capability: CapabilityKind, message: String) -> CapabilityError {
    CapabilityError::InvalidResponse {
        capability,
        message,
    }
}

/// Status codes worth retrying.
fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 409 | 429 | 500 | 502 | 503 | 504)
}

/// Some compatible servers wrap JSON replies in a Markdown code fence.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
