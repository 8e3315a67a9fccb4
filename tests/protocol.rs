//! End-to-end multi-party tree construction with an in-process orchestrator.
//!
//! Two workers hold vertical slices of the same 8 rows. The plain-text
//! aggregator from `vertiboost::testing` plays the external secure side:
//! it scores candidate global buckets against the cumulative membership
//! matrices and broadcasts the winner, the workers resolve each level in
//! lockstep, and the finished per-party trees are checked for shape,
//! redaction, and routing consistency.

use ndarray::Array2;
use vertiboost::testing::{assigned_leaf, combine_reachability, PlainAggregator};
use vertiboost::{
    BucketizerConfig, FeaturesView, Parallelism, SplitInfo, Tree, TreeWorker,
};

const N_ROWS: usize = 8;

// Party 0: two features, feature-major.
const PARTY0_DATA: [f32; 16] = [
    1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, // feature 0
    5.0, 5.0, 1.0, 1.0, 9.0, 9.0, 3.0, 3.0, // feature 1
];
// Party 1: one feature.
const PARTY1_DATA: [f32; 8] = [0.5, 0.1, 0.9, 0.3, 0.7, 0.2, 0.8, 0.6];

const GRADIENTS: [f32; 8] = [-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0];

fn views() -> (FeaturesView<'static>, FeaturesView<'static>) {
    (
        FeaturesView::from_slice(&PARTY0_DATA, N_ROWS, 2).unwrap(),
        FeaturesView::from_slice(&PARTY1_DATA, N_ROWS, 1).unwrap(),
    )
}

/// Drive both workers through a full tree of the given depth, split
/// selection done by the plain-text aggregator.
fn build_tree(
    workers: &mut [TreeWorker; 2],
    memberships: &[Array2<u8>; 2],
    colsample: f64,
    depth: usize,
) -> [Tree; 2] {
    let setups = [
        workers[0].tree_setup(colsample).unwrap(),
        workers[1].tree_setup(colsample).unwrap(),
    ];
    let counts = vec![setups[0].bucket_count, setups[1].bucket_count];
    for w in workers.iter_mut() {
        w.update_buckets_count(counts.clone()).unwrap();
    }

    // When column sampling is active the aggregator must only see the
    // sampled membership columns, in the same order the workers number them.
    let sampled: Vec<Array2<u8>> = memberships
        .iter()
        .zip(&setups)
        .map(|(membership, setup)| match &setup.candidate_buckets {
            None => membership.clone(),
            Some(candidates) => {
                let mut cols = Array2::zeros((N_ROWS, candidates.len()));
                for (i, &c) in candidates.iter().enumerate() {
                    cols.column_mut(i).assign(&membership.column(c));
                }
                cols
            }
        })
        .collect();
    let sampled_views: Vec<_> = sampled.iter().map(|m| m.view()).collect();
    let aggregator = PlainAggregator::new(GRADIENTS.to_vec(), vec![1.0; N_ROWS], 0.1);

    let mut node_rows: Vec<Vec<u8>> = vec![vec![1; N_ROWS]];
    for _ in 0..depth {
        let split_buckets: Vec<usize> = node_rows
            .iter()
            .map(|rows| aggregator.best_global_bucket(&sampled_views, rows))
            .collect();

        let outcomes = [
            workers[0]
                .do_split(&split_buckets, Parallelism::Sequential)
                .unwrap(),
            workers[1]
                .do_split(&split_buckets, Parallelism::Sequential)
                .unwrap(),
        ];

        // Exactly one owner per node; its indicator partitions the rows.
        let mut next_rows = Vec::with_capacity(node_rows.len() * 2);
        for (node, rows) in node_rows.iter().enumerate() {
            let owners: Vec<_> = outcomes
                .iter()
                .filter_map(|o| o[node].left_indicator())
                .collect();
            assert_eq!(owners.len(), 1, "every split has exactly one owner");
            let indicator = owners[0];

            let left: Vec<u8> = rows
                .iter()
                .zip(indicator)
                .map(|(&at_node, &goes_left)| at_node & goes_left)
                .collect();
            let right: Vec<u8> = rows
                .iter()
                .zip(&left)
                .map(|(&at_node, &l)| at_node & (1 - l))
                .collect();
            next_rows.push(left);
            next_rows.push(right);
        }
        node_rows = next_rows;
    }

    [
        workers[0].tree_finish().unwrap(),
        workers[1].tree_finish().unwrap(),
    ]
}

/// Route a row through the union of both parties' trees. Every node is
/// owned by exactly one party, so the merged walk is unambiguous.
fn route_centralized(
    trees: &[Tree; 2],
    views: &(FeaturesView<'_>, FeaturesView<'_>),
    row: usize,
) -> usize {
    let mut position = 0u32;
    while !trees[0].is_leaf_position(position) {
        let value_and_threshold = match (trees[0].split(position), trees[1].split(position)) {
            (SplitInfo::Owned { feature, threshold }, SplitInfo::Foreign) => {
                (views.0.get(row, feature as usize), threshold)
            }
            (SplitInfo::Foreign, SplitInfo::Owned { feature, threshold }) => {
                (views.1.get(row, feature as usize), threshold)
            }
            other => panic!("split ownership must be exclusive, got {other:?}"),
        };
        position = if value_and_threshold.0 <= value_and_threshold.1 {
            2 * position + 1
        } else {
            2 * position + 2
        };
    }
    trees[0].leaf_index(position)
}

fn setup_workers() -> ([TreeWorker; 2], [Array2<u8>; 2]) {
    let (v0, v1) = views();
    let mut w0 = TreeWorker::new(0);
    let mut w1 = TreeWorker::new(1);
    let config = BucketizerConfig::with_buckets(4);
    let m0 = w0
        .global_setup(v0, &config, 94, Parallelism::Sequential)
        .unwrap();
    let m1 = w1
        .global_setup(v1, &config, 94, Parallelism::Sequential)
        .unwrap();
    ([w0, w1], [m0, m1])
}

#[test]
fn two_party_build_produces_complementary_trees() {
    let (mut workers, memberships) = setup_workers();
    let trees = build_tree(&mut workers, &memberships, 1.0, 2);

    // Same shape on both sides: 3 split nodes, 4 leaves.
    for tree in &trees {
        assert_eq!(tree.n_split_nodes(), 3);
        assert_eq!(tree.n_leaves(), 4);
        assert_eq!(tree.depth(), 2);
    }

    // Exclusive ownership with full redaction on the other side.
    for node in 0..3 {
        let owned_by_0 = trees[0].split(node).is_owned();
        let owned_by_1 = trees[1].split(node).is_owned();
        assert!(owned_by_0 ^ owned_by_1);
        let foreign = if owned_by_0 { &trees[1] } else { &trees[0] };
        assert_eq!(foreign.split_features()[node as usize], -1);
        assert_eq!(foreign.split_values()[node as usize], f32::INFINITY);
    }
}

#[test]
fn combined_reachability_matches_centralized_routing() {
    let (mut workers, memberships) = setup_workers();
    let trees = build_tree(&mut workers, &memberships, 1.0, 2);

    let (v0, v1) = views();
    let selects = [
        workers[0].predict_reachability(v0, &trees[0], Parallelism::Sequential),
        workers[1].predict_reachability(v1, &trees[1], Parallelism::Sequential),
    ];
    for select in &selects {
        assert_eq!(select.dim(), (N_ROWS, 4));
    }

    let combined = combine_reachability(&selects);
    let views = views();
    for row in 0..N_ROWS {
        let leaf = assigned_leaf(&combined.view(), row)
            .expect("intersection must leave exactly one leaf");
        assert_eq!(leaf, route_centralized(&trees, &views, row));
    }
}

#[test]
fn first_split_separates_the_gradient_signs() {
    // Gradients flip sign between rows 3 and 4; party 0's feature 0 is
    // sorted, so the best root split cuts cleanly between those rows.
    let (mut workers, memberships) = setup_workers();
    let trees = build_tree(&mut workers, &memberships, 1.0, 1);

    let (v0, v1) = views();
    let selects = [
        workers[0].predict_reachability(v0, &trees[0], Parallelism::Sequential),
        workers[1].predict_reachability(v1, &trees[1], Parallelism::Sequential),
    ];
    let combined = combine_reachability(&selects);

    for row in 0..N_ROWS {
        let leaf = assigned_leaf(&combined.view(), row).unwrap();
        assert_eq!(leaf, usize::from(row >= 4), "row {row} on the wrong side");
    }
}

#[test]
fn column_sampled_build_stays_consistent() {
    let (mut workers, memberships) = setup_workers();
    let trees = build_tree(&mut workers, &memberships, 0.5, 2);

    let (v0, v1) = views();
    let selects = [
        workers[0].predict_reachability(v0, &trees[0], Parallelism::Sequential),
        workers[1].predict_reachability(v1, &trees[1], Parallelism::Sequential),
    ];
    let combined = combine_reachability(&selects);
    let views = views();
    for row in 0..N_ROWS {
        let leaf = assigned_leaf(&combined.view(), row)
            .expect("sampled build must still route every row to one leaf");
        assert_eq!(leaf, route_centralized(&trees, &views, row));
    }
}

#[test]
fn consecutive_trees_reuse_the_partition() {
    let (mut workers, memberships) = setup_workers();

    let first = build_tree(&mut workers, &memberships, 1.0, 2);
    let second = build_tree(&mut workers, &memberships, 1.0, 2);

    // Same data, same gradients, full column sample: the trees agree.
    assert_eq!(first[0], second[0]);
    assert_eq!(first[1], second[1]);
}

#[test]
fn serialized_tree_survives_the_redaction_sentinels() {
    let (mut workers, memberships) = setup_workers();
    let trees = build_tree(&mut workers, &memberships, 1.0, 2);

    for tree in &trees {
        let json = serde_json::to_string(tree).unwrap();
        let back: Tree = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, tree);
    }
}
