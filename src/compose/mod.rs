//! Configuration composition
//!
//! Builds one experiment tree from a primary fragment: the defaults tree is
//! expanded (following `override` directives until the selections settle),
//! every fragment is deep-merged at its package in list order, and
//! command-line value overrides are applied last.

pub mod composer;
pub mod defaults;
pub mod error;
pub mod merge;
pub mod overrides;

pub use composer::{Composer, Composition, TraceEntry};
pub use error::ComposeError;
pub use merge::deep_merge;
pub use overrides::{parse_overrides, Override};
