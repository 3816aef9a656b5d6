//! Dotted key paths (`algo.cnn_keys.encoder`, `fabric.plugins.0`) into a YAML tree

use serde_yaml::{Mapping, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyPathError {
    #[error("empty key path")]
    Empty,
    #[error("key '{0}' not found")]
    Missing(String),
    #[error("'{0}' is not a mapping or list")]
    NotContainer(String),
}

/// Path segment for a mapping key; keys that are not scalars render as `?`.
pub fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => "?".to_string(),
    }
}

pub fn split_key_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Mapping(map) => map.get(segment),
        Value::Sequence(seq) => segment.parse::<usize>().ok().and_then(|i| seq.get(i)),
        _ => None,
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// Look up the value at `path`. The empty path is the root itself.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    split_key_path(path).into_iter().try_fold(root, child)
}

/// Walk to the container holding the last segment of `segments`.
fn parent_mut<'a>(
    root: &'a mut Value,
    parents: &[&str],
    create: bool,
) -> Result<&'a mut Value, KeyPathError> {
    let mut node = root;
    let mut walked = String::new();
    for seg in parents {
        walked = join(&walked, seg);
        node = match node {
            Value::Mapping(map) => {
                if !map.contains_key(*seg) {
                    if !create {
                        return Err(KeyPathError::Missing(walked));
                    }
                    map.insert(Value::String((*seg).to_string()), Value::Mapping(Mapping::new()));
                }
                match map.get_mut(*seg) {
                    Some(next) => next,
                    None => return Err(KeyPathError::Missing(walked)),
                }
            }
            Value::Sequence(seq) => match seg.parse::<usize>().ok().and_then(|i| seq.get_mut(i)) {
                Some(next) => next,
                None => return Err(KeyPathError::Missing(walked)),
            },
            _ => return Err(KeyPathError::NotContainer(walked)),
        };
    }
    Ok(node)
}

/// Set the value at `path`, returning the previous value if any.
///
/// With `create = false` every segment, the last included, must already
/// exist. With `create = true` missing mappings along the way are created.
pub fn set_path(
    root: &mut Value,
    path: &str,
    value: Value,
    create: bool,
) -> Result<Option<Value>, KeyPathError> {
    let segments = split_key_path(path);
    let Some((last, parents)) = segments.split_last() else {
        return Err(KeyPathError::Empty);
    };
    let parent = parent_mut(root, parents, create)?;
    match parent {
        Value::Mapping(map) => {
            if !create && !map.contains_key(*last) {
                return Err(KeyPathError::Missing(path.to_string()));
            }
            Ok(map.insert(Value::String((*last).to_string()), value))
        }
        Value::Sequence(seq) => match last.parse::<usize>().ok().and_then(|i| seq.get_mut(i)) {
            Some(slot) => Ok(Some(std::mem::replace(slot, value))),
            None => Err(KeyPathError::Missing(path.to_string())),
        },
        _ => Err(KeyPathError::NotContainer(parents.join("."))),
    }
}

/// Remove the key at `path`, keeping the order of its siblings.
pub fn remove_path(root: &mut Value, path: &str) -> Result<Value, KeyPathError> {
    let segments = split_key_path(path);
    let Some((last, parents)) = segments.split_last() else {
        return Err(KeyPathError::Empty);
    };
    match parent_mut(root, parents, false)? {
        Value::Mapping(map) => {
            map.shift_remove(*last).ok_or_else(|| KeyPathError::Missing(path.to_string()))
        }
        Value::Sequence(seq) => match last.parse::<usize>() {
            Ok(i) if i < seq.len() => Ok(seq.remove(i)),
            _ => Err(KeyPathError::Missing(path.to_string())),
        },
        _ => Err(KeyPathError::NotContainer(parents.join("."))),
    }
}

/// Wrap `value` into nested single-key mappings along a dotted package path.
pub fn nest_at(package: &str, value: Value) -> Value {
    split_key_path(package).into_iter().rev().fold(value, |inner, seg| {
        let mut map = Mapping::new();
        map.insert(Value::String(seg.to_string()), inner);
        Value::Mapping(map)
    })
}
