//! vertiboost: per-party worker for vertically partitioned gradient boosted
//! decision tree construction.
//!
//! Several parties hold disjoint vertical slices of the feature columns for a
//! shared set of rows. A tree is grown collaboratively, one level at a time,
//! without any party observing another party's raw feature values or the
//! feature/threshold a foreign node split on. Each party runs a
//! [`TreeWorker`]; an external orchestrator (secure aggregation + split
//! selection, not part of this crate) drives the level barrier between them.
//!
//! # Key Types
//!
//! - [`TreeWorker`] - Per-party protocol state machine
//! - [`BucketizedPartition`] - Quantile-bucketized local feature slice
//! - [`GlobalBucketIndex`] - Shared (party, local bucket) numbering
//! - [`Tree`] - Finished, ownership-redacted tree
//!
//! # Protocol flow
//!
//! 1. [`TreeWorker::global_setup`] bucketizes the local columns once per
//!    training run and returns the cumulative bucket-membership matrix fed
//!    into the external secure sum.
//! 2. Per tree: [`TreeWorker::tree_setup`] (column subsampling), then for
//!    every level the orchestrator broadcasts the chosen global bucket ids
//!    and each worker answers with [`TreeWorker::do_split`].
//! 3. [`TreeWorker::tree_finish`] yields the immutable [`Tree`];
//!    [`predict_reachability`] replays it against new rows.
//!
//! The `testing` module contains a plain-text stand-in for the external
//! aggregation so the whole protocol can be exercised in-process.

pub mod data;
pub mod error;
pub mod inference;
pub mod protocol;
pub mod repr;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use data::{bucketize, BucketizedPartition, BucketizerConfig, FeaturesView};
pub use error::{FaultKind, ProtocolError};
pub use inference::predict_reachability;
pub use protocol::{BucketSite, GlobalBucketIndex, SplitOutcome, TreeSetup, TreeWorker};
pub use repr::{NodeId, SplitInfo, Tree, TreeBuilder};
pub use utils::{run_with_threads, Parallelism};
