//! Typed views of composed configuration and tool settings

pub mod experiment;
pub mod settings;

pub use experiment::{ExperimentConfig, SchemaError};
pub use settings::{OutputFormat, Settings};
