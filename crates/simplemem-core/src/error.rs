// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the SimpleMem memory pipeline.

use std::time::Duration;

use thiserror::Error;

use crate::types::{CapabilityKind, TurnRange};

/// Failure of a single call to an external capability.
///
/// Capabilities are the language-understanding and embedding services the
/// pipeline orchestrates. Only [`CapabilityError::is_transient`] failures are
/// retried by the invoker.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    /// The call did not complete within the configured deadline.
    #[error("{capability} capability timed out after {duration:?}")]
    Timeout {
        capability: CapabilityKind,
        duration: Duration,
    },

    /// The capability could not be reached or refused service (rate limit, 5xx, offline).
    #[error("{capability} capability unavailable: {message}")]
    Unavailable {
        capability: CapabilityKind,
        message: String,
    },

    /// The capability answered, but the answer could not be used for this input.
    #[error("{capability} capability returned an invalid response: {message}")]
    InvalidResponse {
        capability: CapabilityKind,
        message: String,
    },
}

impl CapabilityError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CapabilityError::Timeout { .. } | CapabilityError::Unavailable { .. }
        )
    }

    /// The capability that failed.
    pub fn capability(&self) -> CapabilityKind {
        match self {
            CapabilityError::Timeout { capability, .. }
            | CapabilityError::Unavailable { capability, .. }
            | CapabilityError::InvalidResponse { capability, .. } => *capability,
        }
    }
}

/// The primary error type used across the SimpleMem workspace.
#[derive(Debug, Error)]
pub enum SimpleMemError {
    /// A dialogue turn carried a timestamp that cannot be resolved to an absolute time.
    #[error("malformed timestamp `{raw}`: {reason}")]
    MalformedTimestamp { raw: String, reason: String },

    /// The filtering or extraction capability failed for a whole window.
    /// A transient failure keeps the window buffered for the next finalize;
    /// a permanent one drops it.
    #[error("compression unavailable for turns {turns}: {source}")]
    CompressionUnavailable {
        turns: TurnRange,
        #[source]
        source: CapabilityError,
    },

    /// Extraction failed for one turn; the rest of its window was still compressed.
    #[error("extraction failed for turn {turn}: {message}")]
    ExtractionPartialFailure { turn: u64, message: String },

    /// The views disagree about which version of a fact is current.
    /// The fact is quarantined and no further writes to it are accepted.
    #[error("index consistency violation for fact {fact_id}: {detail}")]
    IndexConsistencyViolation { fact_id: String, detail: String },

    /// The query was empty or its parameters were out of range.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Every index view failed or was offline.
    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// A capability call failed outside of a context with its own policy.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (invalid values, missing required settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SimpleMemError {
    /// Whether the same operation may succeed if tried again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            SimpleMemError::CompressionUnavailable { source, .. } => source.is_transient(),
            SimpleMemError::Capability(err) => err.is_transient(),
            SimpleMemError::RetrievalUnavailable(_) | SimpleMemError::Storage { .. } => true,
            _ => false,
        }
    }

    /// Short machine-readable name of the error class, used in summaries and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            SimpleMemError::MalformedTimestamp { .. } => "malformed_timestamp",
            SimpleMemError::CompressionUnavailable { .. } => "compression_unavailable",
            SimpleMemError::ExtractionPartialFailure { .. } => "extraction_partial_failure",
            SimpleMemError::IndexConsistencyViolation { .. } => "index_consistency_violation",
            SimpleMemError::InvalidQuery(_) => "invalid_query",
            SimpleMemError::RetrievalUnavailable(_) => "retrieval_unavailable",
            SimpleMemError::Capability(_) => "capability",
            SimpleMemError::Storage { .. } => "storage",
            SimpleMemError::Config(_) => "config",
            SimpleMemError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let timeout = CapabilityError::Timeout {
            capability: CapabilityKind::Extraction,
            duration: Duration::from_secs(5),
        };
        let down = CapabilityError::Unavailable {
            capability: CapabilityKind::QualityFilter,
            message: "503".into(),
        };
        let bad = CapabilityError::InvalidResponse {
            capability: CapabilityKind::Extraction,
            message: "not json".into(),
        };
        assert!(timeout.is_transient());
        assert!(down.is_transient());
        assert!(!bad.is_transient());
        assert_eq!(bad.capability(), CapabilityKind::Extraction);
    }

    #[test]
    fn compression_unavailable_keeps_source() {
        use std::error::Error as _;

        let err = SimpleMemError::CompressionUnavailable {
            turns: TurnRange { first: 3, last: 7 },
            source: CapabilityError::Unavailable {
                capability: CapabilityKind::QualityFilter,
                message: "connection refused".into(),
            },
        };
        assert_eq!(err.kind(), "compression_unavailable");
        assert!(err.to_string().contains("3..=7"));
        assert!(err.source().is_some());
    }

    #[test]
    fn retryable_follows_capability_source() {
        let window = |source| SimpleMemError::CompressionUnavailable {
            turns: TurnRange::single(1),
            source,
        };
        assert!(
            window(CapabilityError::Unavailable {
                capability: CapabilityKind::QualityFilter,
                message: "503".into(),
            })
            .is_retryable()
        );
        assert!(
            !window(CapabilityError::InvalidResponse {
                capability: CapabilityKind::QualityFilter,
                message: "2 scores for 3 turns".into(),
            })
            .is_retryable()
        );
        assert!(!SimpleMemError::InvalidQuery("empty".into()).is_retryable());
    }

    #[test]
    fn capability_error_converts() {
        let err: SimpleMemError = CapabilityError::Timeout {
            capability: CapabilityKind::Embedding,
            duration: Duration::from_millis(250),
        }
        .into();
        assert_eq!(err.kind(), "capability");
        assert!(err.to_string().contains("embedding"));
    }
}
