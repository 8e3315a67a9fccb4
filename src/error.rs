//! Protocol error taxonomy.
//!
//! Construction failures are labeled so operators know whether to fix local
//! data or cluster configuration: [`FaultKind::LocalData`] faults are
//! recoverable by cleaning this party's dataset, [`FaultKind::ClusterConfig`]
//! faults mean the parties disagree about shared protocol state and retrying
//! with the same configuration reproduces the fault.

use thiserror::Error;

/// Coarse classification of a [`ProtocolError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultKind {
    /// Degenerate or invalid data on this party. Fix the local dataset.
    LocalData,
    /// Cross-party inconsistency (bucket space, call sequence). Fix the
    /// cluster configuration; not retried automatically.
    ClusterConfig,
}

/// Errors raised by the split protocol.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The broadcast global bucket id does not fall inside any party's range.
    #[error("global bucket {bucket} lies outside the {total}-bucket global space")]
    BucketOutOfRange { bucket: usize, total: usize },

    /// A locally-owned bucket id did not map onto any searchable feature.
    /// Happens when the parties disagree about column sampling state.
    #[error(
        "local bucket {bucket} does not map to a searchable feature ({available} candidate buckets)"
    )]
    CandidateBucketOutOfRange { bucket: usize, available: usize },

    /// The collected per-party bucket counts disagree with this party's own
    /// bucket layout.
    #[error("party {party} reported {reported} buckets but owns {actual}")]
    BucketCountMismatch {
        party: usize,
        reported: usize,
        actual: usize,
    },

    /// This worker's party index is not covered by the collected counts.
    #[error("party index {party} outside the {n_parties}-party bucket count list")]
    PartyOutOfRange { party: usize, n_parties: usize },

    /// Bucket counts were never collected before split resolution.
    #[error("party bucket counts have not been received")]
    MissingBucketCounts,

    /// A feature column contains NaN or infinity.
    #[error("feature {feature} has a non-finite value at row {row}")]
    NonFiniteValue { feature: usize, row: usize },

    /// The local feature slice has no rows or no columns.
    #[error("partition has no rows or no features")]
    EmptyPartition,

    /// A level was submitted with the wrong number of split buckets for its
    /// breadth-first position.
    #[error("level {level} expects {expected} split nodes, got {got}")]
    LevelSizeMismatch {
        level: usize,
        expected: usize,
        got: usize,
    },

    /// An operation was called outside its lifecycle phase.
    #[error("{operation} called in {state} state")]
    Lifecycle {
        operation: &'static str,
        state: &'static str,
    },

    /// The tree build was poisoned by an earlier fault; only discarding the
    /// tree is valid.
    #[error("tree build was aborted by an earlier protocol fault")]
    Aborted,
}

impl ProtocolError {
    /// Whether this fault points at local data or at cluster configuration.
    pub fn kind(&self) -> FaultKind {
        match self {
            ProtocolError::NonFiniteValue { .. } | ProtocolError::EmptyPartition => {
                FaultKind::LocalData
            }
            ProtocolError::BucketOutOfRange { .. }
            | ProtocolError::CandidateBucketOutOfRange { .. }
            | ProtocolError::BucketCountMismatch { .. }
            | ProtocolError::PartyOutOfRange { .. }
            | ProtocolError::MissingBucketCounts
            | ProtocolError::LevelSizeMismatch { .. }
            | ProtocolError::Lifecycle { .. }
            | ProtocolError::Aborted => FaultKind::ClusterConfig,
        }
    }

    /// Cluster-configuration faults abort the current tree build and must not
    /// be retried with unchanged global state.
    pub fn is_fatal(&self) -> bool {
        self.kind() == FaultKind::ClusterConfig
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_faults_are_not_fatal() {
        let err = ProtocolError::NonFiniteValue { feature: 2, row: 7 };
        assert_eq!(err.kind(), FaultKind::LocalData);
        assert!(!err.is_fatal());
    }

    #[test]
    fn config_faults_are_fatal() {
        let err = ProtocolError::BucketOutOfRange {
            bucket: 99,
            total: 12,
        };
        assert_eq!(err.kind(), FaultKind::ClusterConfig);
        assert!(err.is_fatal());
    }

    #[test]
    fn messages_name_the_offending_ids() {
        let err = ProtocolError::BucketOutOfRange {
            bucket: 42,
            total: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("10"));
    }
}
