//! Output rendering (trees, traces, check reports)

pub mod report;
pub mod trace;
pub mod tree;

pub use report::{render_check_report, CheckReport};
pub use trace::render_trace;
pub use tree::{render_tree, tree_fingerprint};
