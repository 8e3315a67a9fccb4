//! The per-party worker: a lockstep state machine over aggregation rounds.
//!
//! One `TreeWorker` lives on each party. Bucketization happens once per
//! training run ([`TreeWorker::global_setup`]); each tree then goes through
//! `tree_setup` -> one [`TreeWorker::do_split`] call per level (between the
//! external aggregation barriers) -> `tree_finish`.
//!
//! Split identity flows through an ownership check before any feature or
//! threshold is touched: a node is resolved to its concrete
//! (feature, threshold) only after the global bucket id proves to be inside
//! this party's own range, so foreign split detail can never be read by
//! accident.

use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::data::{bucketize, BucketizedPartition, BucketizerConfig, FeaturesView};
use crate::error::ProtocolError;
use crate::inference::predict_reachability;
use crate::repr::{SplitInfo, Tree, TreeBuilder};
use crate::utils::Parallelism;

use super::{ColumnSample, GlobalBucketIndex};

// =============================================================================
// Outcomes
// =============================================================================

/// Per-node result of a level's split resolution.
#[derive(Clone, Debug, PartialEq)]
pub enum SplitOutcome {
    /// This party owns the split; the left-child indicator has one byte per
    /// row (1 = row goes left, bucket index `<=` the winning offset).
    Owned(Array1<u8>),
    /// Another party owns the split; nothing is revealed and no indicator
    /// is contributed.
    Foreign,
}

impl SplitOutcome {
    /// Whether this party owns the split.
    #[inline]
    pub fn owns(&self) -> bool {
        matches!(self, SplitOutcome::Owned(_))
    }

    /// The left-child indicator, if owned.
    pub fn left_indicator(&self) -> Option<&Array1<u8>> {
        match self {
            SplitOutcome::Owned(indicator) => Some(indicator),
            SplitOutcome::Foreign => None,
        }
    }
}

/// What `tree_setup` hands to the external bucket-count collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeSetup {
    /// Local bucket ids participating in split search this tree, or `None`
    /// when no column subsampling is active.
    pub candidate_buckets: Option<Vec<usize>>,
    /// This party's bucket count under the (possibly sampled) layout.
    pub bucket_count: usize,
}

// =============================================================================
// TreeWorker
// =============================================================================

/// Per-tree build state.
#[derive(Debug)]
struct TreeBuild {
    columns: ColumnSample,
    builder: TreeBuilder,
}

/// One party's worker for the vertical split protocol.
pub struct TreeWorker {
    party: usize,
    rng: Xoshiro256PlusPlus,
    partition: Option<BucketizedPartition>,
    global_index: Option<GlobalBucketIndex>,
    build: Option<TreeBuild>,
}

impl TreeWorker {
    /// Create a worker for the party at `party` in the agreed party order.
    pub fn new(party: usize) -> Self {
        Self {
            party,
            rng: Xoshiro256PlusPlus::seed_from_u64(0),
            partition: None,
            global_index: None,
            build: None,
        }
    }

    /// This worker's position in the agreed party order.
    #[inline]
    pub fn party(&self) -> usize {
        self.party
    }

    /// The local bucket layout, once [`global_setup`](Self::global_setup)
    /// has run.
    pub fn partition(&self) -> Option<&BucketizedPartition> {
        self.partition.as_ref()
    }

    /// Bucketize the local feature slice once per training run and seed the
    /// per-run RNG used by column subsampling.
    ///
    /// Returns the cumulative bucket-membership matrix this party feeds into
    /// the external secure gradient/hessian aggregation.
    pub fn global_setup(
        &mut self,
        features: FeaturesView<'_>,
        config: &BucketizerConfig,
        seed: u64,
        parallelism: Parallelism,
    ) -> Result<Array2<u8>, ProtocolError> {
        let partition = bucketize(features, config, parallelism)?;
        let membership = partition.bucket_membership();

        self.partition = Some(partition);
        self.rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        self.global_index = None;
        self.build = None;
        Ok(membership)
    }

    /// Start a new tree: fresh accumulator, fresh column sample.
    ///
    /// The returned [`TreeSetup`] goes to the external bucket-count
    /// collection; [`update_buckets_count`](Self::update_buckets_count) must
    /// deliver the agreed counts before the first level resolves.
    pub fn tree_setup(&mut self, colsample: f64) -> Result<TreeSetup, ProtocolError> {
        let partition = self.partition.as_ref().ok_or(ProtocolError::Lifecycle {
            operation: "tree_setup",
            state: "unbucketized",
        })?;

        let columns = ColumnSample::draw(partition.n_features(), colsample, &mut self.rng);
        let feature_buckets = partition.feature_buckets();
        let setup = TreeSetup {
            candidate_buckets: columns.candidate_buckets(feature_buckets),
            bucket_count: columns.sampled_bucket_count(feature_buckets),
        };

        self.build = Some(TreeBuild {
            columns,
            builder: TreeBuilder::new(),
        });
        Ok(setup)
    }

    /// Store the externally collected per-party bucket counts.
    ///
    /// This party's own entry is cross-checked against its actual (possibly
    /// column-sampled) layout; a mismatch means the parties disagree about
    /// the global bucket space and is fatal.
    pub fn update_buckets_count(&mut self, counts: Vec<usize>) -> Result<(), ProtocolError> {
        let partition = self.partition.as_ref().ok_or(ProtocolError::Lifecycle {
            operation: "update_buckets_count",
            state: "unbucketized",
        })?;
        if self.party >= counts.len() {
            return Err(ProtocolError::PartyOutOfRange {
                party: self.party,
                n_parties: counts.len(),
            });
        }

        let actual = match &self.build {
            Some(build) => build.columns.sampled_bucket_count(partition.feature_buckets()),
            None => partition.total_buckets(),
        };
        if counts[self.party] != actual {
            return Err(ProtocolError::BucketCountMismatch {
                party: self.party,
                reported: counts[self.party],
                actual,
            });
        }

        self.global_index = Some(GlobalBucketIndex::new(counts));
        Ok(())
    }

    /// Resolve one whole tree level from the broadcast global bucket ids.
    ///
    /// `split_buckets` holds one id per node of the level in breadth-first
    /// position order. For every node this party owns, a concrete split is
    /// recorded and its left-child indicator returned; every foreign node is
    /// recorded redacted. The level commits atomically: on any fault nothing
    /// is appended, the build is poisoned, and the tree must be discarded.
    pub fn do_split(
        &mut self,
        split_buckets: &[usize],
        parallelism: Parallelism,
    ) -> Result<Vec<SplitOutcome>, ProtocolError> {
        let partition = self.partition.as_ref().ok_or(ProtocolError::Lifecycle {
            operation: "do_split",
            state: "unbucketized",
        })?;
        let index = self
            .global_index
            .as_ref()
            .ok_or(ProtocolError::MissingBucketCounts)?;
        let build = self.build.as_mut().ok_or(ProtocolError::Lifecycle {
            operation: "do_split",
            state: "no tree in progress",
        })?;
        if build.builder.is_aborted() {
            return Err(ProtocolError::Aborted);
        }

        let expected = build.builder.expected_level_width();
        if split_buckets.len() != expected {
            build.builder.abort();
            return Err(ProtocolError::LevelSizeMismatch {
                level: build.builder.next_level(),
                expected,
                got: split_buckets.len(),
            });
        }

        // Stage the whole level before touching the tree, so a fault on any
        // node discards the level as a unit.
        let party = self.party;
        let columns = &build.columns;
        let staged: Result<Vec<(SplitInfo, SplitOutcome)>, ProtocolError> = parallelism
            .maybe_par_map(split_buckets.to_vec(), |global_bucket| {
                let site = index.to_local(global_bucket)?;
                if site.party != party {
                    return Ok((SplitInfo::Foreign, SplitOutcome::Foreign));
                }
                let (feature, offset) =
                    columns.locate_bucket(partition.feature_buckets(), site.local_bucket)?;
                let split = SplitInfo::Owned {
                    feature: feature as u32,
                    threshold: partition.threshold(feature, offset),
                };
                let indicator = partition.left_indicator(feature, offset);
                Ok((split, SplitOutcome::Owned(indicator)))
            })
            .into_iter()
            .collect();

        let staged = match staged {
            Ok(staged) => staged,
            Err(err) => {
                build.builder.abort();
                return Err(err);
            }
        };

        let (nodes, outcomes): (Vec<SplitInfo>, Vec<SplitOutcome>) =
            staged.into_iter().unzip();
        build.builder.commit_level(&nodes)?;
        Ok(outcomes)
    }

    /// Finish the current tree, yielding its immutable, ownership-redacted
    /// form. An aborted build errors and is discarded either way.
    pub fn tree_finish(&mut self) -> Result<Tree, ProtocolError> {
        let build = self.build.take().ok_or(ProtocolError::Lifecycle {
            operation: "tree_finish",
            state: "no tree in progress",
        })?;
        build.builder.freeze()
    }

    /// Replay a finished tree against new rows from this party's
    /// perspective. See [`predict_reachability`].
    pub fn predict_reachability(
        &self,
        features: FeaturesView<'_>,
        tree: &Tree,
        parallelism: Parallelism,
    ) -> Array2<u8> {
        predict_reachability(features, tree, parallelism)
    }
}

// =============================================================================
// Tests
// =============================================================================
