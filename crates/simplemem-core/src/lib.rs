// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the SimpleMem memory pipeline.
//!
//! This crate provides the shared data types, the error taxonomy, and the
//! capability traits that the compressor and retriever orchestrate. Language
//! understanding and embedding services plug in by implementing the traits
//! defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{CapabilityError, SimpleMemError};
pub use types::{
    AtomicFact, CapabilityKind, DialogueTurn, FactId, FactTime, FinalizeSummary, HealthStatus,
    MemoryStats, Query, Resolution, RetrievalHit, RetrievalResult, TurnId, TurnInput, TurnRange,
    ViewKind,
};

pub use traits::{
    Capability, ComplexityEstimator, EmbeddingAdapter, FactExtractor, QualityFilter,
};
