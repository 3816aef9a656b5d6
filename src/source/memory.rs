//! In-memory fragment source

use std::collections::BTreeMap;

use super::{parse_fragment, Fragment, FragmentId, FragmentSource, SourceError};

/// Fragments held as YAML text, keyed by identifier.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    entries: BTreeMap<FragmentId, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert: `with("algo/sac", "name: sac\n")`.
    pub fn with(mut self, path: &str, text: &str) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&mut self, path: &str, text: &str) {
        self.entries.insert(FragmentId::parse(path), text.to_string());
    }
}

impl FragmentSource for MemorySource {
    fn load(&self, id: &FragmentId) -> Result<Option<Fragment>, SourceError> {
        self.entries
            .get(id)
            .map(|text| parse_fragment(id, &format!("<memory>/{id}.yaml"), text))
            .transpose()
    }

    fn is_group(&self, group: &str) -> bool {
        let group = crate::utils::normalize_group(group);
        !group.is_empty()
            && self.entries.keys().any(|id| {
                id.group == group || id.group.starts_with(&format!("{group}/"))
            })
    }

    fn fragments(&self) -> Vec<FragmentId> {
        self.entries.keys().cloned().collect()
    }

    fn describe(&self) -> String {
        format!("in-memory source ({} fragments)", self.entries.len())
    }
}
