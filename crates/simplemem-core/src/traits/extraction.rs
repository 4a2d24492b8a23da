// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Proposition extraction.

use async_trait::async_trait;

use crate::error::CapabilityError;
use crate::traits::capability::Capability;
use crate::types::{ExtractedProposition, ExtractionRequest};

/// Splits a turn into self-contained propositions and annotates the
/// references and time expressions each one contains.
///
/// Resolution of those annotations is done by the compressor, not the extractor.
#[async_trait]
pub trait FactExtractor: Capability {
    async fn extract(
        &self,
        request: ExtractionRequest,
    ) -> Result<Vec<ExtractedProposition>, CapabilityError>;
}
