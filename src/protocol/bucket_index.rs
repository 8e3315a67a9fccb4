//! Global bucket numbering shared by all parties.
//!
//! A global bucket id is an offset into the concatenation of all parties'
//! local bucket spaces, in a party order that is agreed once and fixed for
//! the whole tree lifetime. The mapping is a pure function of the per-party
//! bucket counts, so every party resolves the same id to the same site.

use std::ops::Range;

use crate::error::ProtocolError;

/// Resolution of a global bucket id: which party owns it and the offset
/// inside that party's local bucket space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BucketSite {
    pub party: usize,
    pub local_bucket: usize,
}

/// The agreed per-party bucket counts and the pure id arithmetic on them.
///
/// Only the owning party can resolve a `local_bucket` further to a
/// (feature, threshold) pair; this index deliberately knows nothing about
/// features.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalBucketIndex {
    buckets_count: Vec<usize>,
}

impl GlobalBucketIndex {
    /// Build from the externally collected per-party bucket counts, in the
    /// agreed party order.
    pub fn new(buckets_count: Vec<usize>) -> Self {
        Self { buckets_count }
    }

    /// Number of participating parties.
    #[inline]
    pub fn n_parties(&self) -> usize {
        self.buckets_count.len()
    }

    /// Per-party bucket counts in party order.
    #[inline]
    pub fn buckets_count(&self) -> &[usize] {
        &self.buckets_count
    }

    /// Total global bucket count.
    pub fn total_buckets(&self) -> usize {
        self.buckets_count.iter().sum()
    }

    /// The half-open global id range owned by `party`.
    pub fn party_range(&self, party: usize) -> Range<usize> {
        let start: usize = self.buckets_count[..party].iter().sum();
        start..start + self.buckets_count[party]
    }

    /// Resolve a global bucket id to its owning party and local offset.
    ///
    /// Walks the party ranges in the fixed party order. An id outside every
    /// range is a protocol-integrity fault: the parties disagree about the
    /// global bucket space and the tree build must abort.
    pub fn to_local(&self, global_bucket: usize) -> Result<BucketSite, ProtocolError> {
        let mut range_start = 0;
        for (party, &count) in self.buckets_count.iter().enumerate() {
            let range_end = range_start + count;
            if global_bucket < range_end {
                return Ok(BucketSite {
                    party,
                    local_bucket: global_bucket - range_start,
                });
            }
            range_start = range_end;
        }
        Err(ProtocolError::BucketOutOfRange {
            bucket: global_bucket,
            total: range_start,
        })
    }
}
