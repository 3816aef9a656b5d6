//! Command-line overrides: `key=value`, `+key=value`, `++key=value`, `~key`

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;

use super::defaults::{Selection, MANDATORY};
use super::error::ComposeError;
use crate::source::strip_extension;
use crate::utils::{get_path, normalize_scalars, remove_path, set_path};

static OVERRIDE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-./@]+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    /// `key=value`: the key must already exist.
    Set,
    /// `+key=value`: the key must not exist yet.
    Add,
    /// `++key=value`: set or add.
    ForceAdd,
    /// `~key`: remove.
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    /// Original text, kept for error messages.
    pub text: String,
    pub kind: OverrideKind,
    pub key: String,
    pub value: Option<Value>,
}

impl Override {
    /// Interpret the value as a group option (`env=dmc`, `exp=null`).
    pub fn selection(&self) -> Option<Selection> {
        if self.kind == OverrideKind::Delete {
            return Some(Selection::Null);
        }
        match self.value.as_ref()? {
            Value::Null => Some(Selection::Null),
            Value::String(s) if s == MANDATORY => Some(Selection::Mandatory),
            Value::String(s) if !s.is_empty() => {
                Some(Selection::Option(strip_extension(s).to_string()))
            }
            Value::Number(n) => Some(Selection::Option(n.to_string())),
            _ => None,
        }
    }

    /// Group overrides name a group directory, never a dotted key.
    pub fn may_name_group(&self) -> bool {
        !self.key.contains('.')
    }

    fn fail(&self, reason: impl Into<String>) -> ComposeError {
        ComposeError::OverrideFailed { text: self.text.clone(), reason: reason.into() }
    }
}

fn parse_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }
    let mut value = match serde_yaml::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(_) => Value::String(raw.to_string()),
    };
    normalize_scalars(&mut value);
    value
}

pub fn parse_override(text: &str) -> Result<Override, ComposeError> {
    let invalid = |reason: &str| ComposeError::InvalidOverride {
        text: text.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = text.trim();
    let (kind, rest) = if let Some(rest) = trimmed.strip_prefix("++") {
        (OverrideKind::ForceAdd, rest)
    } else if let Some(rest) = trimmed.strip_prefix('+') {
        (OverrideKind::Add, rest)
    } else if let Some(rest) = trimmed.strip_prefix('~') {
        (OverrideKind::Delete, rest)
    } else {
        (OverrideKind::Set, trimmed)
    };

    let (key, value) = match rest.split_once('=') {
        Some((key, raw)) => (key.trim(), Some(parse_value(raw.trim()))),
        None if kind == OverrideKind::Delete => (rest.trim(), None),
        None => return Err(invalid("expected key=value")),
    };

    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    if !OVERRIDE_KEY.is_match(key) {
        return Err(invalid("key may only contain letters, digits, '_', '-', '.', '/' and '@'"));
    }

    Ok(Override { text: text.to_string(), kind, key: key.to_string(), value })
}

pub fn parse_overrides<S: AsRef<str>>(texts: &[S]) -> Result<Vec<Override>, ComposeError> {
    texts.iter().map(|t| parse_override(t.as_ref())).collect()
}

/// Apply a value override to the composed tree.
pub fn apply_value_override(tree: &mut Value, ov: &Override) -> Result<(), ComposeError> {
    let exists = get_path(tree, &ov.key).is_some();
    match ov.kind {
        OverrideKind::Set => {
            if !exists {
                return Err(ov.fail(format!(
                    "key '{}' is not in the configuration; use +{}=... to add it",
                    ov.key, ov.key
                )));
            }
            let value = ov.value.clone().unwrap_or(Value::Null);
            set_path(tree, &ov.key, value, false).map_err(|e| ov.fail(e.to_string()))?;
        }
        OverrideKind::Add => {
            if exists {
                return Err(ov.fail(format!(
                    "key '{}' already exists; use ++{}=... to replace it",
                    ov.key, ov.key
                )));
            }
            let value = ov.value.clone().unwrap_or(Value::Null);
            set_path(tree, &ov.key, value, true).map_err(|e| ov.fail(e.to_string()))?;
        }
        OverrideKind::ForceAdd => {
            let value = ov.value.clone().unwrap_or(Value::Null);
            set_path(tree, &ov.key, value, true).map_err(|e| ov.fail(e.to_string()))?;
        }
        OverrideKind::Delete => {
            remove_path(tree, &ov.key).map_err(|e| ov.fail(e.to_string()))?;
        }
    }
    tracing::debug!(override_ = %ov.text, "applied value override");
    Ok(())
}
