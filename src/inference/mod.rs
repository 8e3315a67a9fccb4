//! Replaying a finished tree against new rows.

mod reachability;

pub use reachability::predict_reachability;
