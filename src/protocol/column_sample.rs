//! Per-tree column subsampling and the bucket-offset arithmetic under it.
//!
//! When a tree is grown with `colsample < 1`, only a sampled subset of this
//! party's features participates in split search, and the party's local
//! bucket space for that tree spans only the selected features' bucket
//! ranges. Choice state and offset resolution are kept as two pure functions
//! composed explicitly, so toggling subsampling between trees cannot drift
//! the offset arithmetic.

use rand::Rng;

use crate::error::ProtocolError;

/// The per-tree choice of searchable local features.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSample {
    /// Sorted selected feature indices; `None` means every feature.
    choices: Option<Vec<usize>>,
}

impl ColumnSample {
    /// Every local feature participates.
    pub fn all() -> Self {
        Self { choices: None }
    }

    /// Sample `ceil(n_features * colsample)` distinct features, sorted.
    ///
    /// `colsample >= 1` selects everything; the RNG is not consumed in that
    /// case, so fully-sampled trees stay reproducible across parties with
    /// different feature counts.
    pub fn draw<R: Rng>(n_features: usize, colsample: f64, rng: &mut R) -> Self {
        if colsample >= 1.0 {
            return Self::all();
        }
        let n_choices = ((n_features as f64 * colsample).ceil() as usize)
            .clamp(1, n_features);
        let mut choices = rand::seq::index::sample(rng, n_features, n_choices).into_vec();
        choices.sort_unstable();
        Self {
            choices: Some(choices),
        }
    }

    /// Sorted selected features, or `None` when all are selected.
    pub fn choices(&self) -> Option<&[usize]> {
        self.choices.as_deref()
    }

    /// Whether a feature participates in split search for this tree.
    pub fn is_selected(&self, feature: usize) -> bool {
        match &self.choices {
            None => true,
            Some(choices) => choices.binary_search(&feature).is_ok(),
        }
    }

    /// Local bucket ids (offsets into the full local bucket layout) of the
    /// selected features' buckets, in ascending order. `None` when the whole
    /// layout participates.
    pub fn candidate_buckets(&self, feature_buckets: &[usize]) -> Option<Vec<usize>> {
        let choices = self.choices.as_ref()?;
        let mut candidates = Vec::new();
        let mut bucket_start = 0;
        for (feature, &count) in feature_buckets.iter().enumerate() {
            if choices.binary_search(&feature).is_ok() {
                candidates.extend(bucket_start..bucket_start + count);
            }
            bucket_start += count;
        }
        Some(candidates)
    }

    /// Bucket count of the sampled layout (what this party reports to the
    /// external bucket-count collection for this tree).
    pub fn sampled_bucket_count(&self, feature_buckets: &[usize]) -> usize {
        match &self.choices {
            None => feature_buckets.iter().sum(),
            Some(choices) => choices.iter().map(|&f| feature_buckets[f]).sum(),
        }
    }

    /// Resolve a local bucket id in the *sampled* layout to a feature and
    /// its bucket offset, walking only selected features.
    pub fn locate_bucket(
        &self,
        feature_buckets: &[usize],
        local_bucket: usize,
    ) -> Result<(usize, usize), ProtocolError> {
        let mut range_start = 0;
        for (feature, &count) in feature_buckets.iter().enumerate() {
            if !self.is_selected(feature) {
                continue;
            }
            let range_end = range_start + count;
            if local_bucket < range_end {
                return Ok((feature, local_bucket - range_start));
            }
            range_start = range_end;
        }
        Err(ProtocolError::CandidateBucketOutOfRange {
            bucket: local_bucket,
            available: range_start,
        })
    }
}
