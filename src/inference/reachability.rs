//! Leaf reachability from one party's partial view of a tree.
//!
//! A single party usually cannot route a row to a unique leaf: at a foreign
//! node it knows neither the feature nor the threshold, so both subtrees stay
//! possible. What it can compute is the set of leaves the row might reach
//! given only the splits it owns. The orchestrator intersects these sets
//! across parties (elementwise AND); because every node is owned by exactly
//! one party, the intersection is a single leaf per row.

use ndarray::{Array2, ArrayViewMut1};

use crate::data::FeaturesView;
use crate::repr::{NodeId, SplitInfo, Tree};
use crate::utils::Parallelism;

/// Compute the per-row leaf reachability matrix for `tree`, shape
/// `[n_samples, n_leaves]`: entry `[r, l]` is 1 iff leaf `l` is reachable
/// for row `r` under this party's splits.
///
/// Owned nodes branch on `value <= threshold` (left), matching the bucket
/// boundary rule used during construction; a NaN value routes right. Foreign
/// nodes keep both children reachable.
pub fn predict_reachability(
    features: FeaturesView<'_>,
    tree: &Tree,
    parallelism: Parallelism,
) -> Array2<u8> {
    let n_samples = features.n_samples();
    let n_leaves = tree.n_leaves();

    let mut select = Array2::zeros((n_samples, n_leaves));
    let rows: Vec<(usize, ArrayViewMut1<'_, u8>)> =
        select.outer_iter_mut().enumerate().collect();
    parallelism.maybe_par_for_each(rows, |(sample, mut row)| {
        mark_reachable_leaves(&features, tree, sample, 0, &mut row);
    });
    select
}

/// Walk the subtree at `position` for one row, marking every reachable leaf.
fn mark_reachable_leaves(
    features: &FeaturesView<'_>,
    tree: &Tree,
    sample: usize,
    position: NodeId,
    row: &mut ArrayViewMut1<'_, u8>,
) {
    if tree.is_leaf_position(position) {
        row[tree.leaf_index(position)] = 1;
        return;
    }
    let left = 2 * position + 1;
    let right = 2 * position + 2;
    match tree.split(position) {
        SplitInfo::Owned { feature, threshold } => {
            if features.get(sample, feature as usize) <= threshold {
                mark_reachable_leaves(features, tree, sample, left, row);
            } else {
                mark_reachable_leaves(features, tree, sample, right, row);
            }
        }
        SplitInfo::Foreign => {
            mark_reachable_leaves(features, tree, sample, left, row);
            mark_reachable_leaves(features, tree, sample, right, row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::TreeBuilder;

    fn owned(feature: u32, threshold: f32) -> SplitInfo {
        SplitInfo::Owned { feature, threshold }
    }

    #[test]
    fn fully_owned_tree_selects_one_leaf_per_row() {
        let mut builder = TreeBuilder::new();
        builder.commit_level(&[owned(0, 0.5)]).unwrap();
        let tree = builder.freeze().unwrap();

        let data = [0.1f32, 0.9, 0.5, 0.6];
        let view = FeaturesView::from_slice(&data, 4, 1).unwrap();
        let select = predict_reachability(view, &tree, Parallelism::Sequential);

        assert_eq!(select.dim(), (4, 2));
        // The threshold itself routes left.
        assert_eq!(select.column(0).to_vec(), vec![1, 0, 1, 0]);
        assert_eq!(select.column(1).to_vec(), vec![0, 1, 0, 1]);
    }

    #[test]
    fn foreign_node_keeps_both_subtrees_reachable() {
        let mut builder = TreeBuilder::new();
        builder.commit_level(&[SplitInfo::Foreign]).unwrap();
        builder
            .commit_level(&[owned(0, 1.0), owned(0, 3.0)])
            .unwrap();
        let tree = builder.freeze().unwrap();

        let data = [2.0f32];
        let view = FeaturesView::from_slice(&data, 1, 1).unwrap();
        let select = predict_reachability(view, &tree, Parallelism::Sequential);

        // 2.0 > 1.0 under the left split, 2.0 <= 3.0 under the right one;
        // the foreign root keeps both paths open.
        assert_eq!(select.row(0).to_vec(), vec![0, 1, 1, 0]);
    }

    #[test]
    fn fully_foreign_tree_marks_every_leaf() {
        let mut builder = TreeBuilder::new();
        builder.commit_level(&[SplitInfo::Foreign]).unwrap();
        builder
            .commit_level(&[SplitInfo::Foreign, SplitInfo::Foreign])
            .unwrap();
        let tree = builder.freeze().unwrap();

        let data = [7.0f32, -2.0];
        let view = FeaturesView::from_slice(&data, 2, 1).unwrap();
        let select = predict_reachability(view, &tree, Parallelism::Sequential);

        assert!(select.iter().all(|&s| s == 1));
    }

    #[test]
    fn single_leaf_tree() {
        let tree = TreeBuilder::new().freeze().unwrap();
        let data = [1.0f32, 2.0, 3.0];
        let view = FeaturesView::from_slice(&data, 3, 1).unwrap();
        let select = predict_reachability(view, &tree, Parallelism::Sequential);

        assert_eq!(select.dim(), (3, 1));
        assert!(select.iter().all(|&s| s == 1));
    }

    #[test]
    fn nan_value_routes_right() {
        let mut builder = TreeBuilder::new();
        builder.commit_level(&[owned(0, 0.5)]).unwrap();
        let tree = builder.freeze().unwrap();

        let data = [f32::NAN];
        let view = FeaturesView::from_slice(&data, 1, 1).unwrap();
        let select = predict_reachability(view, &tree, Parallelism::Sequential);
        assert_eq!(select.row(0).to_vec(), vec![0, 1]);
    }

    #[test]
    fn parallel_matches_sequential() {
        let mut builder = TreeBuilder::new();
        builder.commit_level(&[owned(1, 5.0)]).unwrap();
        builder
            .commit_level(&[owned(0, 0.0), SplitInfo::Foreign])
            .unwrap();
        let tree = builder.freeze().unwrap();

        let data = [
            -1.0f32, 1.0, 0.0, -3.0, // feature 0
            2.0, 8.0, 5.0, 6.0, // feature 1
        ];
        let view = FeaturesView::from_slice(&data, 4, 2).unwrap();
        let seq = predict_reachability(view, &tree, Parallelism::Sequential);
        let par = predict_reachability(view, &tree, Parallelism::Parallel);
        assert_eq!(seq, par);
    }
}
