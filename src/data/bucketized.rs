//! Quantile bucketization of a party's local feature columns.
//!
//! Each continuous feature is cut into at most `buckets` equal-frequency
//! buckets. The cut points are the "linear"-interpolated quantiles of the
//! sorted column (the same method numpy uses by default), computed
//! deterministically with `f32::total_cmp`, so identical input always yields
//! identical buckets.
//!
//! Two explicit rules that numeric libraries usually absorb implicitly:
//!
//! - **Duplicate edges are dropped.** A feature with fewer distinct values
//!   than requested buckets silently contributes fewer effective buckets,
//!   never an error.
//! - **Empty buckets are excised.** Skewed cuts can produce a bucket no row
//!   falls into; such buckets are removed and the remaining indices
//!   re-densified so they stay contiguous from 0.
//!
//! A row belongs to bucket `b` of feature `f` iff its value is `<=` the
//! bucket's upper edge `split_points[f][b]` (and above the previous edge).
//! The same `<=` comparison is used for split routing, so bucket-boundary
//! rows never misroute.

use ndarray::{Array1, Array2, ArrayView2};

use crate::error::ProtocolError;
use crate::utils::Parallelism;

use super::FeaturesView;

// =============================================================================
// BucketizerConfig
// =============================================================================

/// Configuration for quantile bucketization.
#[derive(Clone, Copy, Debug)]
pub struct BucketizerConfig {
    /// Target buckets per feature. The effective count per feature may be
    /// lower on features with few distinct values.
    pub buckets: usize,
}

impl Default for BucketizerConfig {
    fn default() -> Self {
        Self { buckets: 16 }
    }
}

impl BucketizerConfig {
    /// Create a config with the given target bucket count.
    ///
    /// # Panics
    ///
    /// Panics if `buckets` is 0 or exceeds `u16::MAX`.
    pub fn with_buckets(buckets: usize) -> Self {
        assert!(
            buckets >= 1 && buckets <= u16::MAX as usize,
            "buckets must be in [1, {}], got {}",
            u16::MAX,
            buckets
        );
        Self { buckets }
    }
}

// =============================================================================
// BucketizedPartition
// =============================================================================

/// The quantile-bucketized form of one party's local feature slice.
///
/// Built once per training run by [`bucketize`] and owned exclusively by
/// this party's worker; foreign parties never see it.
#[derive(Clone, Debug, PartialEq)]
pub struct BucketizedPartition {
    /// Per row, per local feature: the bucket index, in
    /// `[0, feature_buckets[f])`. Shape `[n_samples, n_features]`.
    order_map: Array2<u16>,
    /// Per local feature: ascending upper edges of the populated buckets.
    split_points: Vec<Vec<f32>>,
    /// Per local feature: populated bucket count. Always equals
    /// `split_points[f].len()`.
    feature_buckets: Vec<usize>,
}

impl BucketizedPartition {
    /// Number of rows in the shared row set.
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.order_map.nrows()
    }

    /// Number of local features.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.order_map.ncols()
    }

    /// Populated bucket count per local feature.
    #[inline]
    pub fn feature_buckets(&self) -> &[usize] {
        &self.feature_buckets
    }

    /// Total local bucket count (sum over features).
    pub fn total_buckets(&self) -> usize {
        self.feature_buckets.iter().sum()
    }

    /// Ascending bucket upper edges for a local feature.
    #[inline]
    pub fn split_points(&self, feature: usize) -> &[f32] {
        &self.split_points[feature]
    }

    /// The split threshold revealed when bucket `offset` of `feature` wins.
    #[inline]
    pub fn threshold(&self, feature: usize, offset: usize) -> f32 {
        self.split_points[feature][offset]
    }

    /// Per-row bucket indices, shape `[n_samples, n_features]`.
    #[inline]
    pub fn order_map(&self) -> ArrayView2<'_, u16> {
        self.order_map.view()
    }

    /// Cumulative bucket membership, shape `[n_samples, total_buckets]`.
    ///
    /// The column for (feature `f`, bucket `b`) is 1 iff the row's bucket
    /// index for `f` is `<= b`. Cumulative on purpose: summing gradients
    /// against one column directly yields the left-partition totals for the
    /// candidate split at that bucket's threshold, which is exactly what the
    /// external secure aggregation consumes.
    pub fn bucket_membership(&self) -> Array2<u8> {
        let n_rows = self.n_samples();
        let mut membership = Array2::zeros((n_rows, self.total_buckets()));

        let mut col = 0;
        for f in 0..self.n_features() {
            for b in 0..self.feature_buckets[f] {
                for r in 0..n_rows {
                    if self.order_map[[r, f]] as usize <= b {
                        membership[[r, col]] = 1;
                    }
                }
                col += 1;
            }
        }
        membership
    }

    /// Left-child indicator for a split at bucket `offset` of `feature`:
    /// 1 where the row's bucket index is `<= offset`, one byte per row.
    pub fn left_indicator(&self, feature: usize, offset: usize) -> Array1<u8> {
        self.order_map
            .column(feature)
            .mapv(|b| u8::from(b as usize <= offset))
    }
}

// =============================================================================
// Bucketization
// =============================================================================

/// Bucketize a party's local feature matrix.
///
/// Runs [`cut_feature`] independently per feature, parallelized across
/// features when `parallelism` allows. Deterministic: identical input and
/// config produce an identical partition regardless of parallelism.
///
/// # Errors
///
/// - [`ProtocolError::EmptyPartition`] if `features` has no rows or columns.
/// - [`ProtocolError::NonFiniteValue`] if any value is NaN or infinite.
pub fn bucketize(
    features: FeaturesView<'_>,
    config: &BucketizerConfig,
    parallelism: Parallelism,
) -> Result<BucketizedPartition, ProtocolError> {
    let n_samples = features.n_samples();
    let n_features = features.n_features();

    if n_samples == 0 || n_features == 0 {
        return Err(ProtocolError::EmptyPartition);
    }
    let buckets = BucketizerConfig::with_buckets(config.buckets).buckets;

    let cuts: Vec<Result<(Vec<u16>, Vec<f32>), ProtocolError>> =
        parallelism.maybe_par_map(0..n_features, |f| {
            let column = features.feature(f);
            let values = column
                .as_slice()
                .map(|s| s.to_vec())
                .unwrap_or_else(|| column.to_vec());

            if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                return Err(ProtocolError::NonFiniteValue { feature: f, row });
            }
            Ok(cut_feature(&values, buckets))
        });

    let mut order_map = Array2::zeros((n_samples, n_features));
    let mut split_points = Vec::with_capacity(n_features);
    let mut feature_buckets = Vec::with_capacity(n_features);

    for (f, cut) in cuts.into_iter().enumerate() {
        let (order, points) = cut?;
        debug_assert_eq!(order.len(), n_samples);
        for (r, &b) in order.iter().enumerate() {
            order_map[[r, f]] = b;
        }
        feature_buckets.push(points.len());
        split_points.push(points);
    }

    Ok(BucketizedPartition {
        order_map,
        split_points,
        feature_buckets,
    })
}

/// Cut a single feature column into at most `buckets` quantile buckets.
///
/// Returns the per-row bucket index and the ascending upper edges of the
/// populated buckets (one edge per bucket).
fn cut_feature(values: &[f32], buckets: usize) -> (Vec<u16>, Vec<f32>) {
    let n = values.len();
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);

    // Candidate edges at ranks (n-1) * i / B, linearly interpolated, with
    // duplicate edges dropped as they appear.
    let mut edges: Vec<f32> = Vec::with_capacity(buckets + 1);
    for i in 0..=buckets {
        let rank = (n - 1) as f64 * i as f64 / buckets as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let frac = rank - lo as f64;
        let edge = (sorted[lo] as f64 + (sorted[hi] as f64 - sorted[lo] as f64) * frac) as f32;
        if edges.last().map_or(true, |&last| edge > last) {
            edges.push(edge);
        }
    }

    // A (near-)constant column collapses into a single bucket.
    if edges.len() < 2 {
        return (vec![0; n], vec![sorted[n - 1]]);
    }

    // edges[1..] are the candidate bucket upper bounds; a value lands in the
    // first bucket whose upper edge it does not exceed (`<=` goes left).
    let uppers = &edges[1..];
    let interior = &uppers[..uppers.len() - 1];
    let mut order: Vec<u16> = values
        .iter()
        .map(|&v| interior.partition_point(|&e| e < v) as u16)
        .collect();

    // Excise empty buckets and re-densify so indices stay contiguous from 0.
    let mut counts = vec![0usize; uppers.len()];
    for &b in &order {
        counts[b as usize] += 1;
    }
    let mut remap = vec![0u16; uppers.len()];
    let mut split_points = Vec::with_capacity(uppers.len());
    for (b, &count) in counts.iter().enumerate() {
        if count > 0 {
            remap[b] = split_points.len() as u16;
            split_points.push(uppers[b]);
        }
    }
    for b in &mut order {
        *b = remap[*b as usize];
    }

    (order, split_points)
}

// =============================================================================
// Tests
// =============================================================================
