//! Settings file loading

use crate::domain::Settings;
use anyhow::{Context, Result};
use figment::providers::{Env, Serialized};
use figment::Figment;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "RL_COMPOSE_";
const SECTION: &str = "rl-compose";

/// Load settings from a file (explicit or discovered in `root`) and overlay
/// `RL_COMPOSE_*` environment variables.
pub fn load_settings(root: &Path, settings_path: Option<&Path>) -> Result<Settings> {
    let from_file = load_settings_file(root, settings_path)?;
    overlay_env(from_file, ENV_PREFIX)
}

pub fn load_settings_file(root: &Path, settings_path: Option<&Path>) -> Result<Settings> {
    let settings_path_provided = settings_path.is_some();

    let discovered = match settings_path {
        Some(path) => Some(path.to_path_buf()),
        None => discover_settings(root),
    };

    let Some(settings_file) = discovered else {
        return Ok(Settings::default());
    };

    let content = fs::read_to_string(&settings_file)
        .with_context(|| format!("Failed reading settings file: {}", settings_file.display()))?;

    let ext =
        settings_file.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "toml" => parse_toml_settings(&content, &settings_file),
        "yaml" | "yml" => parse_yaml_settings(&content, &settings_file),
        other => Err(anyhow::anyhow!(
            "Unsupported settings extension '.{}' for file {}",
            other,
            settings_file.display()
        )),
    };

    // A discovered file that fails to parse is skipped; an explicit one is an error.
    let mut settings = match parsed {
        Ok(settings) => settings,
        Err(e) if !settings_path_provided => {
            tracing::warn!(
                "Ignoring auto-discovered settings {}: {:#}",
                settings_file.display(),
                e
            );
            return Ok(Settings::default());
        }
        Err(e) => return Err(e),
    };

    let base = settings_file.parent().unwrap_or(root);
    settings.search_paths = settings
        .search_paths
        .into_iter()
        .map(|p| if p.is_relative() { base.join(p) } else { p })
        .collect();
    tracing::debug!(file = %settings_file.display(), "loaded settings");
    Ok(settings)
}

/// Parse TOML settings, accepting a nested `[rl-compose]` table.
fn parse_toml_settings(content: &str, settings_file: &Path) -> Result<Settings> {
    let raw: toml::Value = toml::from_str(content)
        .with_context(|| format!("Invalid TOML syntax: {}", settings_file.display()))?;

    let section = match raw.get(SECTION) {
        Some(nested) => nested.clone(),
        None => raw,
    };

    section
        .try_into()
        .with_context(|| format!("Invalid TOML settings: {}", settings_file.display()))
}

/// Parse YAML settings, accepting a nested `rl-compose` mapping.
fn parse_yaml_settings(content: &str, settings_file: &Path) -> Result<Settings> {
    let raw: serde_yaml::Value = serde_yaml::from_str(content)
        .with_context(|| format!("Invalid YAML syntax: {}", settings_file.display()))?;

    let section = match raw.get(SECTION) {
        Some(nested) => nested.clone(),
        None => raw,
    };

    // An empty file is all defaults.
    if section.is_null() {
        return Ok(Settings::default());
    }
    serde_yaml::from_value(section)
        .with_context(|| format!("Invalid YAML settings: {}", settings_file.display()))
}

/// Overlay environment variables named `{prefix}{KEY}` on `settings`.
pub fn overlay_env(settings: Settings, prefix: &str) -> Result<Settings> {
    Figment::from(Serialized::defaults(settings))
        .merge(Env::prefixed(prefix))
        .extract()
        .with_context(|| format!("Invalid {prefix}* environment settings"))
}

fn discover_settings(root: &Path) -> Option<PathBuf> {
    let candidates = ["rl-compose.toml", ".rl-compose.toml", "rl-compose.yaml", ".rl-compose.yml"];

    for candidate in candidates {
        let path = root.join(candidate);
        if path.exists() {
            return Some(path);
        }
    }

    None
}
