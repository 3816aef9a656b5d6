//! Defaults list entries

use serde_yaml::Value;
use thiserror::Error;

use crate::source::parse::kind_of;
use crate::source::strip_extension;

/// Literal marking a selection that must be supplied by an override.
pub const MANDATORY: &str = "???";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefaultsError {
    #[error("'defaults' must be a list")]
    NotAList,

    #[error("entry #{index}: {source}")]
    Entry {
        index: usize,
        #[source]
        source: Box<DefaultsError>,
    },

    #[error("empty entry")]
    EmptyEntry,

    #[error("empty option name")]
    EmptyOption,

    #[error("option must be a name or null, found {0}")]
    BadOption(&'static str),

    #[error("unknown keyword '{0}'")]
    UnknownKeyword(String),

    #[error("missing group name in '{0}'")]
    MissingGroup(String),

    #[error("empty package in '{0}'")]
    EmptyPackage(String),

    #[error("group name must be a string")]
    NonStringGroup,

    #[error("override entry '{0}' cannot be optional or packaged")]
    DecoratedOverride(String),

    #[error("entries must have exactly one key, found {0}")]
    KeyCount(usize),

    #[error("unsupported entry: {0}")]
    Unsupported(&'static str),

    #[error("'_self_' listed more than once")]
    DuplicateSelf,
}

/// Option chosen for a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Option(String),
    /// `group: null`: the group contributes nothing.
    Null,
    /// `group: ???`: an override has to pick an option.
    Mandatory,
}

impl Selection {
    fn from_value(value: &Value) -> Result<Self, DefaultsError> {
        match value {
            Value::Null => Ok(Selection::Null),
            Value::String(s) if s == MANDATORY => Ok(Selection::Mandatory),
            Value::String(s) if s.trim().is_empty() => Err(DefaultsError::EmptyOption),
            Value::String(s) => Ok(Selection::Option(strip_extension(s.trim()).to_string())),
            // `env: 1` style options are file names too
            Value::Bool(b) => Ok(Selection::Option(b.to_string())),
            Value::Number(n) => Ok(Selection::Option(n.to_string())),
            other => Err(DefaultsError::BadOption(kind_of(other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultsEntry {
    /// `_self_`
    SelfMarker,
    /// Bare fragment reference: `dreamer_v3`, `/algo/base`.
    Config { path: String },
    /// `group: option`, `/group@pkg: option`, `optional group: option`.
    Group { group: String, package: Option<String>, selection: Selection, optional: bool },
    /// `override /group: option`.
    Override { group: String, selection: Selection },
}

fn parse_group_key(key: &str) -> Result<(bool, bool, String, Option<String>), DefaultsError> {
    let mut words = key.split_whitespace().collect::<Vec<_>>();
    let mut is_override = false;
    let mut optional = false;
    while words.len() > 1 {
        match words[0] {
            "override" => is_override = true,
            "optional" => optional = true,
            other => return Err(DefaultsError::UnknownKeyword(other.to_string())),
        }
        words.remove(0);
    }
    let Some(target) = words.first() else {
        return Err(DefaultsError::MissingGroup(key.to_string()));
    };
    let (group, package) = match target.split_once('@') {
        Some((g, p)) if !p.is_empty() => (g, Some(p.to_string())),
        Some(_) => return Err(DefaultsError::EmptyPackage(target.to_string())),
        None => (*target, None),
    };
    if group.trim_matches('/').is_empty() {
        return Err(DefaultsError::MissingGroup(key.to_string()));
    }
    Ok((is_override, optional, group.to_string(), package))
}

fn parse_entry(entry: &Value) -> Result<DefaultsEntry, DefaultsError> {
    match entry {
        Value::String(s) if s == "_self_" => Ok(DefaultsEntry::SelfMarker),
        Value::String(s) if s.trim().is_empty() => Err(DefaultsError::EmptyEntry),
        Value::String(s) => Ok(DefaultsEntry::Config { path: strip_extension(s.trim()).to_string() }),
        Value::Mapping(map) if map.len() == 1 => {
            let (key, value) = map.iter().next().ok_or(DefaultsError::KeyCount(0))?;
            let key = key.as_str().ok_or(DefaultsError::NonStringGroup)?;
            let (is_override, optional, group, package) = parse_group_key(key)?;
            let selection = Selection::from_value(value)?;
            if is_override {
                if optional || package.is_some() {
                    return Err(DefaultsError::DecoratedOverride(key.to_string()));
                }
                Ok(DefaultsEntry::Override { group, selection })
            } else {
                Ok(DefaultsEntry::Group { group, package, selection, optional })
            }
        }
        Value::Mapping(map) => Err(DefaultsError::KeyCount(map.len())),
        other => Err(DefaultsError::Unsupported(kind_of(other))),
    }
}

/// Parse a raw `defaults` list.
pub fn parse_defaults(list: &Value) -> Result<Vec<DefaultsEntry>, DefaultsError> {
    let Value::Sequence(items) = list else {
        return Err(DefaultsError::NotAList);
    };
    let entries = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            parse_entry(item)
                .map_err(|source| DefaultsError::Entry { index: i + 1, source: Box::new(source) })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if entries.iter().filter(|e| matches!(e, DefaultsEntry::SelfMarker)).count() > 1 {
        return Err(DefaultsError::DuplicateSelf);
    }
    Ok(entries)
}
