//! Shared helpers: key paths, scalar normalisation, hashing

pub mod hashing;
pub mod keypath;
pub mod paths;
pub mod scalars;

pub use hashing::fingerprint;
pub use keypath::{
    get_path, key_text, nest_at, remove_path, set_path, split_key_path, KeyPathError,
};
pub use paths::{join_group, normalize_group, package_from_group};
pub use scalars::normalize_scalars;
