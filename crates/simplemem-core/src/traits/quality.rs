// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Information-density scoring for dialogue turns.

use async_trait::async_trait;

use crate::error::CapabilityError;
use crate::traits::capability::Capability;
use crate::types::DialogueTurn;

/// Scores how much new, durable information each turn of a window carries.
///
/// Turns scoring below the configured threshold are dropped before extraction.
#[async_trait]
pub trait QualityFilter: Capability {
    /// Returns one score in `[0, 1]` per input turn, in input order.
    async fn score(&self, window: &[DialogueTurn]) -> Result<Vec<f32>, CapabilityError>;
}
