//! Fragment sources
//!
//! A source maps a `group/name` identifier to a parsed fragment. The
//! composer only talks to the [`FragmentSource`] trait; fragments come from
//! layered directories in normal use and from memory in tests.

use std::fmt;

pub mod directory;
pub mod memory;
pub mod parse;

pub use directory::DirectorySource;
pub use memory::MemorySource;
pub use parse::{parse_fragment, SourceError};

use serde_yaml::{Mapping, Value};

/// Identifier of one fragment: its group directory and its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentId {
    pub group: String,
    pub name: String,
}

impl FragmentId {
    pub fn new(group: &str, name: &str) -> Self {
        Self { group: crate::utils::normalize_group(group), name: strip_extension(name).to_string() }
    }

    /// Parse `algo/sac` or `config.yaml` (root group).
    pub fn parse(path: &str) -> Self {
        let normalized = crate::utils::normalize_group(path);
        match normalized.rsplit_once('/') {
            Some((group, name)) => Self::new(group, name),
            None => Self::new("", &normalized),
        }
    }

    /// Resolve a bare fragment reference relative to the group it appears in.
    pub fn relative_to(group: &str, path: &str) -> Self {
        let joined = crate::utils::join_group(group, path);
        Self::parse(&joined)
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.group, self.name)
        }
    }
}

pub fn strip_extension(name: &str) -> &str {
    name.strip_suffix(".yaml").or_else(|| name.strip_suffix(".yml")).unwrap_or(name)
}

/// A loaded fragment, split into its defaults list and its own keys.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub id: FragmentId,
    /// Where the fragment came from (file path or `<memory>`).
    pub origin: String,
    /// Value of a `# @package` header, if any.
    pub package: Option<String>,
    /// Raw `defaults` list, parsed by the composer.
    pub defaults: Option<Value>,
    pub body: Mapping,
}

pub trait FragmentSource {
    /// Load a fragment; `Ok(None)` when it does not exist.
    fn load(&self, id: &FragmentId) -> Result<Option<Fragment>, SourceError>;

    /// Whether `group` names a fragment group.
    fn is_group(&self, group: &str) -> bool;

    /// All fragments this source can serve, sorted.
    fn fragments(&self) -> Vec<FragmentId>;

    /// Short description for error messages.
    fn describe(&self) -> String;
}
