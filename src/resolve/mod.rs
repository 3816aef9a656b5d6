//! Interpolation resolution and mandatory-value checks

use serde_yaml::Value;

pub mod interpolate;
pub mod resolvers;

pub use interpolate::{resolve, InterpolationError};
pub use resolvers::ResolverRegistry;

use crate::compose::defaults::MANDATORY;
use crate::utils::key_text;

/// Paths that still hold the mandatory marker `???`.
pub fn missing_values(tree: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_missing(tree, "", &mut out);
    out
}

fn collect_missing(node: &Value, path: &str, out: &mut Vec<String>) {
    let child_path = |segment: String| {
        if path.is_empty() {
            segment
        } else {
            format!("{path}.{segment}")
        }
    };
    match node {
        Value::String(s) if s == MANDATORY => out.push(path.to_string()),
        Value::Sequence(seq) => {
            for (i, item) in seq.iter().enumerate() {
                collect_missing(item, &child_path(i.to_string()), out);
            }
        }
        Value::Mapping(map) => {
            for (key, value) in map {
                collect_missing(value, &child_path(key_text(key)), out);
            }
        }
        _ => {}
    }
}
