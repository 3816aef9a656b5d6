//! Composed tree output

use anyhow::{Context, Result};
use serde_yaml::Value;

use crate::domain::OutputFormat;
use crate::utils::fingerprint;

pub fn render_yaml(tree: &Value) -> Result<String> {
    serde_yaml::to_string(tree).context("Failed rendering configuration as YAML")
}

pub fn render_json(tree: &Value) -> Result<String> {
    let mut out =
        serde_json::to_string_pretty(tree).context("Failed rendering configuration as JSON")?;
    out.push('\n');
    Ok(out)
}

pub fn render_tree(tree: &Value, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => render_yaml(tree),
        OutputFormat::Json => render_json(tree),
    }
}

/// Fingerprint of the canonical YAML rendering.
pub fn tree_fingerprint(tree: &Value) -> Result<String> {
    Ok(fingerprint(&render_yaml(tree)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Value {
        serde_yaml::from_str("seed: 42\nalgo:\n  name: sac\n  keys: [rgb]\n").expect("yaml")
    }

    #[test]
    fn test_yaml_keeps_key_order() {
        let out = render_yaml(&tree()).expect("yaml");
        assert_eq!(out, "seed: 42\nalgo:\n  name: sac\n  keys:\n  - rgb\n");
    }

    #[test]
    fn test_json_output_parses_back() {
        let out = render_tree(&tree(), OutputFormat::Json).expect("json");
        let parsed: serde_json::Value = serde_json::from_str(&out).expect("parse");
        assert_eq!(parsed["algo"]["name"], "sac");
        assert_eq!(parsed["seed"], 42);
    }

    #[test]
    fn test_fingerprint_follows_content() {
        let a = tree_fingerprint(&tree()).expect("fp");
        let mut other = tree();
        other["seed"] = Value::from(7);
        assert_ne!(a, tree_fingerprint(&other).expect("fp"));
        assert_eq!(a, tree_fingerprint(&tree()).expect("fp"));
    }
}
