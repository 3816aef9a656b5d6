//! Directory-backed fragment source with layered search paths

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{parse_fragment, Fragment, FragmentId, FragmentSource, SourceError};

const EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Fragments stored as `<root>/<group>/<name>.yaml`.
///
/// Roots are searched in order and the first hit wins, so a project
/// directory listed first shadows the same fragment in a base directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    roots: Vec<PathBuf>,
}

impl DirectorySource {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn candidate_paths(&self, id: &FragmentId) -> impl Iterator<Item = PathBuf> + '_ {
        let group = id.group.clone();
        let name = id.name.clone();
        self.roots.iter().flat_map(move |root| {
            let dir = if group.is_empty() { root.clone() } else { root.join(&group) };
            let name = name.clone();
            EXTENSIONS.iter().map(move |ext| dir.join(format!("{name}.{ext}")))
        })
    }
}

fn fragment_id_for(root: &Path, path: &Path) -> Option<FragmentId> {
    let ext = path.extension().and_then(|e| e.to_str())?;
    if !EXTENSIONS.contains(&ext) {
        return None;
    }
    let rel = path.strip_prefix(root).ok()?.to_str()?;
    Some(FragmentId::parse(rel))
}

impl FragmentSource for DirectorySource {
    fn load(&self, id: &FragmentId) -> Result<Option<Fragment>, SourceError> {
        let Some(path) = self.candidate_paths(id).find(|p| p.is_file()) else {
            return Ok(None);
        };
        let origin = path.display().to_string();
        tracing::debug!(fragment = %id, origin = %origin, "reading fragment");
        let text = fs::read_to_string(&path).map_err(|source| SourceError::Io {
            id: id.to_string(),
            origin: origin.clone(),
            source,
        })?;
        parse_fragment(id, &origin, &text).map(Some)
    }

    fn is_group(&self, group: &str) -> bool {
        let group = crate::utils::normalize_group(group);
        !group.is_empty() && self.roots.iter().any(|root| root.join(&group).is_dir())
    }

    fn fragments(&self) -> Vec<FragmentId> {
        let mut found = BTreeSet::new();
        for root in &self.roots {
            for entry in WalkDir::new(root).follow_links(true).into_iter().filter_map(|e| e.ok()) {
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Some(id) = fragment_id_for(root, entry.path()) {
                    found.insert(id);
                }
            }
        }
        found.into_iter().collect()
    }

    fn describe(&self) -> String {
        let roots: Vec<String> = self.roots.iter().map(|r| r.display().to_string()).collect();
        format!("search path [{}]", roots.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, text).expect("write");
    }

    #[test]
    fn test_first_root_shadows_later_roots() {
        let project = TempDir::new().expect("tmp");
        let base = TempDir::new().expect("tmp");
        write(base.path(), "algo/sac.yaml", "name: sac\nlr: 0.001\n");
        write(project.path(), "algo/sac.yaml", "name: sac\nlr: 0.0003\n");
        write(base.path(), "algo/ppo.yml", "name: ppo\n");

        let source =
            DirectorySource::new(vec![project.path().to_path_buf(), base.path().to_path_buf()]);
        let sac = source.load(&FragmentId::parse("algo/sac")).expect("load").expect("found");
        assert_eq!(sac.body.get("lr").and_then(|v| v.as_f64()), Some(0.0003));

        let ppo = source.load(&FragmentId::parse("algo/ppo")).expect("load").expect("found");
        assert!(ppo.origin.ends_with("ppo.yml"));

        assert!(source.load(&FragmentId::parse("algo/missing")).expect("load").is_none());
    }

    #[test]
    fn test_groups_and_listing() {
        let root = TempDir::new().expect("tmp");
        write(root.path(), "config.yaml", "seed: 1\n");
        write(root.path(), "env/dmc.yaml", "id: walker_walk\n");
        write(root.path(), "env/README.md", "not a fragment\n");

        let source = DirectorySource::new(vec![root.path().to_path_buf()]);
        assert!(source.is_group("env"));
        assert!(!source.is_group("algo"));
        assert!(!source.is_group(""));

        let listed: Vec<String> = source.fragments().iter().map(|id| id.to_string()).collect();
        assert_eq!(listed, vec!["config".to_string(), "env/dmc".to_string()]);
    }

    #[test]
    fn test_invalid_yaml_reports_origin() {
        let root = TempDir::new().expect("tmp");
        write(root.path(), "env/bad.yaml", "id: [unclosed\n");
        let source = DirectorySource::new(vec![root.path().to_path_buf()]);
        let err = source.load(&FragmentId::parse("env/bad")).unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }
}
