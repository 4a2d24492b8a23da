// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query complexity estimation.

use async_trait::async_trait;

use crate::error::CapabilityError;
use crate::traits::capability::Capability;

/// Estimates how much evidence a query needs, as a score in `[0, 1]`.
///
/// Simple lookups score near 0; multi-hop or aggregate questions score near 1.
#[async_trait]
pub trait ComplexityEstimator: Capability {
    async fn estimate(&self, query: &str) -> Result<f32, CapabilityError>;
}
