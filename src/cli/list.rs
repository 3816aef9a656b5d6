//! List command implementation

use anyhow::{Context, Result};
use clap::Args;
use globset::{Glob, GlobMatcher};
use std::collections::BTreeMap;

use super::utils::{directory_source, load_run_settings, SourceArgs};
use crate::config::CliOverrides;
use crate::source::{FragmentId, FragmentSource};
use crate::utils::normalize_group;

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Only list this group
    #[arg(short = 'g', long, value_name = "GROUP")]
    pub group: Option<String>,

    /// Only list fragments whose group/name matches this glob
    #[arg(long, value_name = "GLOB")]
    pub filter: Option<String>,
}

fn build_matcher(pattern: Option<&str>) -> Result<Option<GlobMatcher>> {
    pattern
        .map(|p| {
            Glob::new(p)
                .map(|g| g.compile_matcher())
                .with_context(|| format!("Invalid filter glob: {p}"))
        })
        .transpose()
}

/// Fragments grouped by group directory, filtered by group and glob.
pub fn group_fragments(
    fragments: Vec<FragmentId>,
    group: Option<&str>,
    matcher: Option<&GlobMatcher>,
) -> BTreeMap<String, Vec<String>> {
    let group = group.map(normalize_group);
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for id in fragments {
        if group.as_ref().is_some_and(|g| &id.group != g) {
            continue;
        }
        if matcher.is_some_and(|m| !m.is_match(id.to_string())) {
            continue;
        }
        grouped.entry(id.group.clone()).or_default().push(id.name);
    }
    grouped
}

pub fn run(args: ListArgs) -> Result<()> {
    let settings = load_run_settings(&args.source, CliOverrides::default())?;
    let source = directory_source(&settings)?;
    let matcher = build_matcher(args.filter.as_deref())?;

    let grouped = group_fragments(source.fragments(), args.group.as_deref(), matcher.as_ref());
    if grouped.is_empty() {
        anyhow::bail!("No fragments found in {}", source.describe());
    }
    for (group, names) in grouped {
        let label = if group.is_empty() { "<root>" } else { group.as_str() };
        println!("{label}:");
        for name in names {
            println!("  {name}");
        }
    }
    Ok(())
}
