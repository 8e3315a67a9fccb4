//! The per-party accumulating tree and its finished, immutable form.
//!
//! Every party holds a structurally identical tree: split nodes are stored
//! as two parallel arrays indexed by breadth-first position (0 = root,
//! children of `i` at `2i+1` / `2i+2`). A node this party owns carries its
//! real feature index and threshold; a foreign node is fully redacted (the
//! [`FOREIGN_FEATURE`] sentinel and a `+inf` threshold) - never partially
//! revealed. Leaves are implicit: position `p >= n_split_nodes` is leaf
//! `p - n_split_nodes`.
//!
//! Construction is strictly breadth-first: [`TreeBuilder`] accepts one whole
//! level at a time (level `l` has exactly `2^l` nodes) and commits it
//! atomically, so an aborted build never leaves a half-written level.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

use super::NodeId;

/// Sentinel feature index marking a split owned by another party.
pub const FOREIGN_FEATURE: i32 = -1;

/// What this party knows about one split node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SplitInfo {
    /// A split on one of this party's own features.
    Owned { feature: u32, threshold: f32 },
    /// A split owned by another party; feature and threshold are hidden.
    Foreign,
}

impl SplitInfo {
    /// Whether this party can resolve the branch at this node.
    #[inline]
    pub fn is_owned(&self) -> bool {
        matches!(self, SplitInfo::Owned { .. })
    }
}

// =============================================================================
// Tree
// =============================================================================

/// A finished, read-only tree as known to one party.
///
/// The persisted layout is stable across parties: `2^depth - 1` entries in
/// each parallel array, identical node positions, `2^depth` implicit
/// leaves. Combining per-party trees into one ensemble artifact is the
/// orchestrator's job; this type only guarantees the shared shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    /// Local feature index per node, [`FOREIGN_FEATURE`] where redacted.
    split_features: Vec<i32>,
    /// Threshold per node, `+inf` where redacted.
    #[serde(with = "redactable_values")]
    split_values: Vec<f32>,
}

impl Tree {
    /// Number of split nodes (`2^depth - 1`).
    #[inline]
    pub fn n_split_nodes(&self) -> usize {
        self.split_features.len()
    }

    /// Number of implicit leaves (`2^depth`).
    #[inline]
    pub fn n_leaves(&self) -> usize {
        self.split_features.len() + 1
    }

    /// Tree depth (0 for a single-leaf tree).
    pub fn depth(&self) -> u32 {
        usize::BITS - self.n_leaves().leading_zeros() - 1
    }

    /// Whether a breadth-first position falls past the split nodes.
    #[inline]
    pub fn is_leaf_position(&self, position: NodeId) -> bool {
        position as usize >= self.n_split_nodes()
    }

    /// Leaf index for a leaf position.
    #[inline]
    pub fn leaf_index(&self, position: NodeId) -> usize {
        debug_assert!(self.is_leaf_position(position));
        position as usize - self.n_split_nodes()
    }

    /// This party's knowledge of the split at `node`.
    #[inline]
    pub fn split(&self, node: NodeId) -> SplitInfo {
        let idx = node as usize;
        let feature = self.split_features[idx];
        if feature == FOREIGN_FEATURE {
            SplitInfo::Foreign
        } else {
            SplitInfo::Owned {
                feature: feature as u32,
                threshold: self.split_values[idx],
            }
        }
    }

    /// Raw feature array (sentinel [`FOREIGN_FEATURE`] where redacted).
    pub fn split_features(&self) -> &[i32] {
        &self.split_features
    }

    /// Raw threshold array (`+inf` where redacted).
    pub fn split_values(&self) -> &[f32] {
        &self.split_values
    }
}

/// Serialize thresholds with `+inf` (redacted) mapped to `null`, since the
/// sentinel survives formats without an infinity literal.
mod redactable_values {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<Option<f32>> = values
            .iter()
            .map(|&v| if v.is_finite() { Some(v) } else { None })
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let encoded: Vec<Option<f32>> = Deserialize::deserialize(deserializer)?;
        Ok(encoded
            .into_iter()
            .map(|v| v.unwrap_or(f32::INFINITY))
            .collect())
    }
}

// =============================================================================
// TreeBuilder
// =============================================================================

/// The accumulating tree during construction.
///
/// State machine: building (level commits) -> finished via [`freeze`], or
/// aborted via [`abort`] after a protocol fault, after which only discarding
/// the tree is valid.
///
/// [`freeze`]: TreeBuilder::freeze
/// [`abort`]: TreeBuilder::abort
#[derive(Debug)]
pub struct TreeBuilder {
    split_features: Vec<i32>,
    split_values: Vec<f32>,
    /// Index of the next level to commit.
    level: usize,
    aborted: bool,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            split_features: Vec::new(),
            split_values: Vec::new(),
            level: 0,
            aborted: false,
        }
    }

    /// Number of split nodes the next level must contain (`2^level`).
    #[inline]
    pub fn expected_level_width(&self) -> usize {
        1 << self.level
    }

    /// Index of the next level to commit.
    #[inline]
    pub fn next_level(&self) -> usize {
        self.level
    }

    /// Append one whole level of split nodes, in breadth-first position
    /// order. All-or-nothing: on error nothing is appended.
    pub fn commit_level(&mut self, nodes: &[SplitInfo]) -> Result<(), ProtocolError> {
        if self.aborted {
            return Err(ProtocolError::Aborted);
        }
        let expected = self.expected_level_width();
        if nodes.len() != expected {
            return Err(ProtocolError::LevelSizeMismatch {
                level: self.level,
                expected,
                got: nodes.len(),
            });
        }

        self.split_features.reserve(expected);
        self.split_values.reserve(expected);
        for node in nodes {
            match *node {
                SplitInfo::Owned { feature, threshold } => {
                    self.split_features.push(feature as i32);
                    self.split_values.push(threshold);
                }
                SplitInfo::Foreign => {
                    self.split_features.push(FOREIGN_FEATURE);
                    self.split_values.push(f32::INFINITY);
                }
            }
        }
        self.level += 1;
        Ok(())
    }

    /// Poison the build after a protocol fault; committed levels are kept in
    /// memory but the tree can no longer be finished.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Whether the build was poisoned.
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Finish the build, yielding the immutable tree.
    ///
    /// A build with zero committed levels freezes into a single-leaf tree.
    pub fn freeze(self) -> Result<Tree, ProtocolError> {
        if self.aborted {
            return Err(ProtocolError::Aborted);
        }
        debug_assert_eq!(self.split_features.len(), (1 << self.level) - 1);
        Ok(Tree {
            split_features: self.split_features,
            split_values: self.split_values,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
