//! Data access and quantile bucketization for a party's local feature slice.
//!
//! # Overview
//!
//! - [`FeaturesView`]: read-only feature-major view `[n_features, n_samples]`
//!   over this party's vertical slice of the dataset.
//! - [`BucketizedPartition`]: the quantile-bucketized form of that slice
//!   (order map, split points, per-feature bucket counts) built once per
//!   training run by [`bucketize`].
//!
//! No other party ever receives access to either structure; the only derived
//! artifact that leaves this module is the cumulative bucket-membership
//! matrix handed to the external secure aggregation.

mod bucketized;
mod views;

pub use bucketized::{bucketize, BucketizedPartition, BucketizerConfig};
pub use views::FeaturesView;
