// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for SimpleMem integration tests.
//!
//! Provides deterministic capabilities and a test harness for fast,
//! CI-runnable tests without a model endpoint.
//!
//! # Components
//!
//! - [`HeuristicQualityFilter`] - scores turns by content-word count
//! - [`ScriptedExtractor`] - pre-scripted propositions per turn content
//! - [`HashEmbedder`] - bag-of-words hashing embedder
//! - [`FixedComplexity`] - constant complexity estimate
//! - [`TestHarness`] - a `MemorySystem` wired to all of the above

pub mod capabilities;
pub mod harness;

pub use capabilities::{
    FixedComplexity, HashEmbedder, HeuristicQualityFilter, ScriptedExtractor, TEST_DIMENSIONS,
};
pub use harness::{TestHarness, TestHarnessBuilder};
