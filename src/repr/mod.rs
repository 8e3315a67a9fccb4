//! Ownership-redacted tree representation.

/// Node identifier: the breadth-first position in the complete binary tree
/// (0 = root, children of `i` at `2i+1` / `2i+2`).
pub type NodeId = u32;

mod tree;

pub use tree::{SplitInfo, Tree, TreeBuilder, FOREIGN_FEATURE};
