//! `_target_` instantiation
//!
//! Every mapping carrying a `_target_` key in the resolved tree names a
//! component. Targets are looked up in an explicit [`TargetRegistry`]; the
//! constructor validates the keyword arguments and returns a typed
//! [`Component`]. Nothing is imported or reflected at run time.

use serde_yaml::Value;
use thiserror::Error;

pub mod components;
pub mod registry;

pub use components::{ArgError, Component, Kwargs, TARGET_KEY};
pub use registry::TargetRegistry;

use crate::source::parse::kind_of;
use crate::utils::key_text;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("{path}: unknown _target_ '{target}'")]
    Unknown { path: String, target: String },
    #[error("{path}: _target_ must be a string, found {kind}")]
    NotAString { path: String, kind: &'static str },
    #[error("{path}: '{target}' got an unexpected keyword argument '{arg}'")]
    UnexpectedArgument { path: String, target: String, arg: String },
    #[error("{path}: '{target}' is missing required argument '{arg}'")]
    MissingArgument { path: String, target: String, arg: String },
    #[error("{path}: '{target}' argument '{arg}' must be {expected}, found {found}")]
    WrongType {
        path: String,
        target: String,
        arg: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{path}: '{target}' argument '{arg}' is invalid: {reason}")]
    InvalidArgument { path: String, target: String, arg: String, reason: String },
}

impl TargetError {
    fn from_arg(path: &str, target: &str, err: ArgError) -> Self {
        let (path, target) = (path.to_string(), target.to_string());
        match err {
            ArgError::Unexpected(arg) => TargetError::UnexpectedArgument { path, target, arg },
            ArgError::Missing(arg) => TargetError::MissingArgument { path, target, arg },
            ArgError::WrongType { arg, expected, found } => {
                TargetError::WrongType { path, target, arg, expected, found }
            }
            ArgError::Invalid { arg, reason } => {
                TargetError::InvalidArgument { path, target, arg, reason }
            }
        }
    }
}

/// A component built from the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Instantiated {
    /// Dotted path of the `_target_` mapping; empty for the root.
    pub path: String,
    pub target: String,
    pub component: Component,
}

/// Build every `_target_` mapping in `tree`, parents before children.
pub fn instantiate_all(
    tree: &Value,
    registry: &TargetRegistry,
) -> Result<Vec<Instantiated>, TargetError> {
    let mut out = Vec::new();
    walk(tree, "", registry, &mut out)?;
    Ok(out)
}

fn walk(
    node: &Value,
    path: &str,
    registry: &TargetRegistry,
    out: &mut Vec<Instantiated>,
) -> Result<(), TargetError> {
    let child_path = |segment: &str| {
        if path.is_empty() {
            segment.to_string()
        } else {
            format!("{path}.{segment}")
        }
    };
    match node {
        Value::Mapping(map) => {
            if let Some(target) = map.get(TARGET_KEY) {
                let Value::String(target) = target else {
                    return Err(TargetError::NotAString {
                        path: path.to_string(),
                        kind: kind_of(target),
                    });
                };
                let constructor = registry.get(target).ok_or_else(|| TargetError::Unknown {
                    path: path.to_string(),
                    target: target.clone(),
                })?;
                let mut kwargs = Kwargs::new(map);
                let component = constructor(&mut kwargs)
                    .and_then(|component| kwargs.finish().map(|()| component))
                    .map_err(|e| TargetError::from_arg(path, target, e))?;
                tracing::debug!(path, target = %target, kind = component.kind(), "instantiated");
                out.push(Instantiated { path: path.to_string(), target: target.clone(), component });
            }
            for (key, value) in map {
                walk(value, &child_path(&key_text(key)), registry, out)?;
            }
        }
        Value::Sequence(seq) => {
            for (i, item) in seq.iter().enumerate() {
                walk(item, &child_path(&i.to_string()), registry, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}
