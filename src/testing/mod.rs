//! In-process stand-ins for the external orchestrator.
//!
//! In production the gradient aggregation and split selection happen inside
//! a secure computation the workers never observe. For tests the same math
//! is done here in plain text: sum gradients against the cumulative
//! bucket-membership columns, score each candidate with the usual
//! second-order gain, and broadcast the winning global bucket id. This lets
//! a full multi-party tree build run in a single test process.

use ndarray::{Array2, ArrayView2};

/// Plain-text replacement for the secure gradient aggregation and split
/// selection.
#[derive(Clone, Debug)]
pub struct PlainAggregator {
    gradients: Vec<f32>,
    hessians: Vec<f32>,
    reg_lambda: f32,
}

impl PlainAggregator {
    /// One gradient/hessian pair per shared row.
    pub fn new(gradients: Vec<f32>, hessians: Vec<f32>, reg_lambda: f32) -> Self {
        assert_eq!(gradients.len(), hessians.len());
        Self {
            gradients,
            hessians,
            reg_lambda,
        }
    }

    /// Pick the best global bucket for one node.
    ///
    /// `memberships` holds each party's cumulative bucket-membership matrix
    /// in the agreed party order; their columns concatenate into the global
    /// bucket space. `node_rows[r]` restricts the sums to the rows currently
    /// sitting at the node. Returns the global bucket id with the highest
    /// split gain.
    pub fn best_global_bucket(
        &self,
        memberships: &[ArrayView2<'_, u8>],
        node_rows: &[u8],
    ) -> usize {
        let total_g: f32 = self.masked_sum(&self.gradients, node_rows);
        let total_h: f32 = self.masked_sum(&self.hessians, node_rows);
        let base = total_g * total_g / (total_h + self.reg_lambda);

        let mut best = (f32::NEG_INFINITY, 0);
        let mut global = 0;
        for membership in memberships {
            for col in membership.columns() {
                let mut left_g = 0.0f32;
                let mut left_h = 0.0f32;
                for (r, &m) in col.iter().enumerate() {
                    if m == 1 && node_rows[r] == 1 {
                        left_g += self.gradients[r];
                        left_h += self.hessians[r];
                    }
                }
                let right_g = total_g - left_g;
                let right_h = total_h - left_h;
                let gain = left_g * left_g / (left_h + self.reg_lambda)
                    + right_g * right_g / (right_h + self.reg_lambda)
                    - base;
                if gain > best.0 {
                    best = (gain, global);
                }
                global += 1;
            }
        }
        best.1
    }

    fn masked_sum(&self, values: &[f32], mask: &[u8]) -> f32 {
        values
            .iter()
            .zip(mask)
            .filter(|(_, &m)| m == 1)
            .map(|(&v, _)| v)
            .sum()
    }
}

/// Intersect per-party leaf reachability matrices (elementwise AND).
///
/// Because every split node is owned by exactly one party, the intersection
/// leaves exactly one reachable leaf per row.
pub fn combine_reachability(selects: &[Array2<u8>]) -> Array2<u8> {
    let mut combined = selects[0].clone();
    for select in &selects[1..] {
        assert_eq!(select.dim(), combined.dim());
        combined.zip_mut_with(select, |c, &s| *c &= s);
    }
    combined
}

/// The unique leaf a row reaches in a combined reachability matrix, or
/// `None` if the row's reachability is not a singleton.
pub fn assigned_leaf(combined: &ArrayView2<'_, u8>, row: usize) -> Option<usize> {
    let mut leaf = None;
    for (l, &reachable) in combined.row(row).iter().enumerate() {
        if reachable == 1 {
            if leaf.is_some() {
                return None;
            }
            leaf = Some(l);
        }
    }
    leaf
}
