// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory pipeline for SimpleMem.
//!
//! Turns raw dialogue into versioned atomic facts, indexes them in three
//! views, and answers queries with complexity-adaptive hybrid retrieval.
//!
//! ## Architecture
//!
//! - **DialogueBuffer**: ordered turns awaiting compression, drained in windows
//! - **SemanticCompressor**: filtering, extraction, coreference and temporal resolution
//! - **FactStore**: SQLite persistence of every fact version
//! - **MultiViewIndex**: semantic, lexical (BM25), and symbolic views behind one snapshot
//! - **AdaptiveRetriever**: complexity-scaled fan-out and reciprocal rank fusion
//! - **MemorySystem**: facade wiring the above together

pub mod buffer;
pub mod capability;
pub mod compressor;
pub mod fusion;
pub mod index;
pub mod metrics;
pub mod retriever;
pub mod store;
pub mod system;
pub mod text;
pub mod timestamp;

pub use buffer::DialogueBuffer;
pub use capability::{CapabilityInvoker, RetryPolicy};
pub use compressor::{CompressorSettings, SemanticCompressor, WindowOutcome};
pub use fusion::reciprocal_rank_fusion;
pub use index::{IndexSnapshot, MultiViewIndex};
pub use retriever::{AdaptiveRetriever, RetrieverSettings};
pub use store::FactStore;
pub use system::{Capabilities, MemorySystem};
