//! The per-party split protocol: global bucket numbering, per-tree column
//! sampling, and the worker state machine that ties them to the tree
//! accumulator.

mod bucket_index;
mod column_sample;
mod worker;

pub use bucket_index::{BucketSite, GlobalBucketIndex};
pub use column_sample::ColumnSample;
pub use worker::{SplitOutcome, TreeSetup, TreeWorker};
