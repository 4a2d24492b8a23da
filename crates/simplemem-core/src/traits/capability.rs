// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait that all capabilities implement.

use async_trait::async_trait;

use crate::error::CapabilityError;
use crate::types::{CapabilityKind, HealthStatus};

/// The base trait for every external capability.
///
/// Provides identity and a health check. Role traits such as
/// [`FactExtractor`](crate::traits::FactExtractor) extend it.
#[async_trait]
pub trait Capability: Send + Sync + 'static {
    /// Returns the human-readable name of this capability instance.
    fn name(&self) -> &str;

    /// Returns which role this capability plays.
    fn kind(&self) -> CapabilityKind;

    /// Performs a health check and returns the capability's current status.
    async fn health_check(&self) -> Result<HealthStatus, CapabilityError> {
        Ok(HealthStatus::Healthy)
    }
}
