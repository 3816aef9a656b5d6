//! Tool settings: where fragments live and how output is written

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

/// Settings resolved from file, environment and command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Fragment directories, searched in order.
    pub search_paths: Vec<PathBuf>,
    /// Primary fragment composed when none is given.
    pub config_name: String,
    pub format: OutputFormat,
    /// Resolve `${...}` interpolations before printing.
    pub resolve: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search_paths: vec![PathBuf::from("configs")],
            config_name: "config".to_string(),
            format: OutputFormat::Yaml,
            resolve: true,
        }
    }
}
