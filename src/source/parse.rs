//! Fragment text parsing shared by all sources

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use super::{Fragment, FragmentId};
use crate::utils::normalize_scalars;

static PACKAGE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#\s*@package\s+(\S+)\s*$").unwrap());

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed reading fragment '{id}' from {origin}: {source}")]
    Io {
        id: String,
        origin: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML in fragment '{id}' ({origin}): {source}")]
    Yaml {
        id: String,
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("fragment '{id}' ({origin}) is invalid: {reason}")]
    Invalid { id: String, origin: String, reason: String },
}

/// Read a `# @package` directive from the leading comment block.
fn package_header(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .take_while(|line| line.is_empty() || line.starts_with('#'))
        .find_map(|line| PACKAGE_HEADER.captures(line).map(|c| c[1].to_string()))
}

pub fn parse_fragment(id: &FragmentId, origin: &str, text: &str) -> Result<Fragment, SourceError> {
    let package = package_header(text);

    let mut value: Value = serde_yaml::from_str(text).map_err(|source| SourceError::Yaml {
        id: id.to_string(),
        origin: origin.to_string(),
        source,
    })?;
    normalize_scalars(&mut value);

    let mut body = match value {
        Value::Mapping(map) => map,
        // Empty file or comments only
        Value::Null => Mapping::new(),
        other => {
            return Err(SourceError::Invalid {
                id: id.to_string(),
                origin: origin.to_string(),
                reason: format!("top level must be a mapping, found {}", kind_of(&other)),
            })
        }
    };

    let defaults = body.shift_remove("defaults");
    if let Some(list) = &defaults {
        if !matches!(list, Value::Sequence(_)) {
            return Err(SourceError::Invalid {
                id: id.to_string(),
                origin: origin.to_string(),
                reason: "'defaults' must be a list".to_string(),
            });
        }
    }

    Ok(Fragment { id: id.clone(), origin: origin.to_string(), package, defaults, body })
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
