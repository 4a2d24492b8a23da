// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability trait definitions.
//!
//! Every external service the pipeline calls implements [`Capability`] plus
//! one role trait. All traits use `#[async_trait]` so they can be held as
//! `Arc<dyn ...>`.

pub mod capability;
pub mod complexity;
pub mod embedding;
pub mod extraction;
pub mod quality;

pub use capability::Capability;
pub use complexity::ComplexityEstimator;
pub use embedding::EmbeddingAdapter;
pub use extraction::FactExtractor;
pub use quality::QualityFilter;
