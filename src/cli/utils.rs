//! Shared CLI utilities.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::compose::{parse_overrides, Composer, Composition};
use crate::config::{load_settings, merge_cli_with_config, CliOverrides};
use crate::domain::{OutputFormat, Settings};
use crate::source::DirectorySource;

/// Where fragments come from; shared by every subcommand that reads them.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Fragment directory (repeatable, searched in order)
    #[arg(short = 'd', long = "config-dir", value_name = "DIR")]
    pub config_dir: Vec<PathBuf>,

    /// Tool settings file (TOML or YAML)
    #[arg(short = 's', long, value_name = "FILE")]
    pub settings: Option<PathBuf>,
}

pub fn parse_format(format: Option<&str>) -> Result<Option<OutputFormat>> {
    let Some(format) = format else {
        return Ok(None);
    };
    match format.to_ascii_lowercase().as_str() {
        "yaml" | "yml" => Ok(Some(OutputFormat::Yaml)),
        "json" => Ok(Some(OutputFormat::Json)),
        invalid => anyhow::bail!("Invalid format '{invalid}'. Use: yaml|json"),
    }
}

/// Settings from file and environment with command-line values on top.
pub fn load_run_settings(source: &SourceArgs, mut cli: CliOverrides) -> Result<Settings> {
    let cwd = std::env::current_dir()?;
    let loaded = load_settings(&cwd, source.settings.as_deref())?;
    if !source.config_dir.is_empty() {
        cli.search_paths = Some(source.config_dir.clone());
    }
    Ok(merge_cli_with_config(loaded, cli))
}

pub fn directory_source(settings: &Settings) -> Result<DirectorySource> {
    let existing: Vec<PathBuf> =
        settings.search_paths.iter().filter(|p| p.is_dir()).cloned().collect();
    for missing in settings.search_paths.iter().filter(|p| !p.is_dir()) {
        tracing::warn!("Config directory not found: {}", missing.display());
    }
    if existing.is_empty() {
        let searched: Vec<String> =
            settings.search_paths.iter().map(|p| p.display().to_string()).collect();
        anyhow::bail!("No config directory found (searched: {})", searched.join(", "));
    }
    Ok(DirectorySource::new(existing))
}

/// Compose `settings.config_name` with the given command-line overrides.
pub fn compose_from_settings(settings: &Settings, overrides: &[String]) -> Result<Composition> {
    let source = directory_source(settings)?;
    let overrides = parse_overrides(overrides)?;
    Composer::new(&source)
        .compose(&settings.config_name, &overrides)
        .with_context(|| format!("Failed composing '{}'", settings.config_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format(None).expect("none"), None);
        assert_eq!(parse_format(Some("JSON")).expect("json"), Some(OutputFormat::Json));
        assert_eq!(parse_format(Some("yml")).expect("yml"), Some(OutputFormat::Yaml));
        assert!(parse_format(Some("xml")).is_err());
    }

    #[test]
    fn test_directory_source_requires_an_existing_dir() {
        let tmp = tempfile::TempDir::new().expect("tmp");
        let settings = Settings {
            search_paths: vec![tmp.path().join("nope"), tmp.path().to_path_buf()],
            ..Settings::default()
        };
        let source = directory_source(&settings).expect("source");
        assert_eq!(source.roots(), &[tmp.path().to_path_buf()]);

        let settings = Settings { search_paths: vec![tmp.path().join("nope")], ..Settings::default() };
        assert!(directory_source(&settings).is_err());
    }
}
