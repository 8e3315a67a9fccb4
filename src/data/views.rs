//! View types for algorithm access.
//!
//! Read-only access to a party's local feature matrix with semantics
//! appropriate for the algorithms: contiguous per-feature slices for
//! bucketization, strided per-sample access for tree routing.

use ndarray::{ArrayView1, ArrayView2};

/// Read-only view into this party's local feature data.
///
/// Internal storage is feature-major: `[n_features, n_samples]`.
/// This means:
/// - `feature(f)` returns all samples for feature f (contiguous)
/// - `sample_view(s)` returns all features for sample s (strided)
///
/// The API uses conceptual terms (sample, feature) not array terms
/// (row, col).
#[derive(Clone, Copy)]
pub struct FeaturesView<'a> {
    /// Shape: [n_features, n_samples] - feature-major
    data: ArrayView2<'a, f32>,
}

impl<'a> FeaturesView<'a> {
    /// Create a features view from a feature-major array.
    ///
    /// # Arguments
    ///
    /// * `data` - Array with shape `[n_features, n_samples]`
    pub fn from_array(data: ArrayView2<'a, f32>) -> Self {
        Self { data }
    }

    /// Create from a contiguous slice in feature-major order.
    ///
    /// This is zero-copy. Data layout: `[f0_s0, f0_s1, ..., f1_s0, ...]`.
    ///
    /// # Returns
    ///
    /// `None` if the slice length doesn't match `n_samples * n_features`.
    pub fn from_slice(data: &'a [f32], n_samples: usize, n_features: usize) -> Option<Self> {
        ArrayView2::from_shape((n_features, n_samples), data)
            .ok()
            .map(|view| Self { data: view })
    }

    /// Number of samples (second dimension).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Number of local features (first dimension).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.nrows()
    }

    /// Get feature value at (sample, feature).
    ///
    /// Internally accesses `[feature, sample]` due to storage layout.
    #[inline]
    pub fn get(&self, sample: usize, feature: usize) -> f32 {
        self.data[[feature, sample]]
    }

    /// Get a contiguous view of all sample values for a feature.
    ///
    /// This is the fast path for bucketization.
    #[inline]
    pub fn feature(&self, feature: usize) -> ArrayView1<'_, f32> {
        self.data.row(feature)
    }

    /// Get all features for a sample.
    ///
    /// Returns a strided view; fine for tree routing, where each node
    /// touches a single feature.
    #[inline]
    pub fn sample_view(&self, sample: usize) -> ArrayView1<'_, f32> {
        self.data.column(sample)
    }

    /// Get the underlying array view, shape `[n_features, n_samples]`.
    pub fn view(&self) -> ArrayView2<'a, f32> {
        self.data
    }
}

impl std::fmt::Debug for FeaturesView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeaturesView")
            .field("n_features", &self.n_features())
            .field("n_samples", &self.n_samples())
            .finish()
    }
}
