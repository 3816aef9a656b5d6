//! Composition errors

use thiserror::Error;

use super::defaults::DefaultsError;
use crate::source::SourceError;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("could not find fragment '{id}' (requested by '{requested_by}') in {searched}")]
    FragmentNotFound { id: String, requested_by: String, searched: String },

    #[error("invalid defaults list in '{id}': {source}")]
    InvalidDefaults {
        id: String,
        #[source]
        source: DefaultsError,
    },

    #[error(
        "override of group '{group}' from '{declared_in}' does not match any group in the defaults list"
    )]
    UnknownOverrideGroup { group: String, declared_in: String },

    #[error("no option selected for mandatory group '{group}' (declared in '{declared_in}'); pass {group}=<option>")]
    MissingSelection { group: String, declared_in: String },

    #[error("cyclic defaults: {chain}")]
    CyclicDefaults { chain: String },

    #[error("group overrides did not settle after {passes} passes")]
    Unsettled { passes: usize },

    #[error("invalid override '{text}': {reason}")]
    InvalidOverride { text: String, reason: String },

    #[error("could not apply override '{text}': {reason}")]
    OverrideFailed { text: String, reason: String },
}
