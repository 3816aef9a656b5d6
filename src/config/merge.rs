//! Command-line values layered over loaded settings

use crate::domain::{OutputFormat, Settings};
use std::path::PathBuf;

/// Settings given on the command line; `None` keeps the loaded value.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub search_paths: Option<Vec<PathBuf>>,
    pub config_name: Option<String>,
    pub format: Option<OutputFormat>,
    pub resolve: Option<bool>,
}

pub fn merge_cli_with_config(settings: Settings, cli: CliOverrides) -> Settings {
    Settings {
        search_paths: cli.search_paths.filter(|p| !p.is_empty()).unwrap_or(settings.search_paths),
        config_name: cli.config_name.unwrap_or(settings.config_name),
        format: cli.format.unwrap_or(settings.format),
        resolve: cli.resolve.unwrap_or(settings.resolve),
    }
}
