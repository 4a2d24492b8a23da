// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::CapabilityError;
use crate::traits::capability::Capability;

/// Converts text into dense vectors for the semantic view.
#[async_trait]
pub trait EmbeddingAdapter: Capability {
    /// Dimensionality of every vector this adapter returns.
    fn dimensions(&self) -> usize;

    /// Embeds a batch of texts, returning one vector per input in input order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, CapabilityError>;
}
