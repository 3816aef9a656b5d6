//! Check command implementation

use anyhow::{Context, Result};
use clap::Args;

use super::utils::{compose_from_settings, load_run_settings, SourceArgs};
use crate::config::CliOverrides;
use crate::domain::ExperimentConfig;
use crate::render::{render_check_report, tree_fingerprint, CheckReport};
use crate::resolve::{missing_values, resolve, ResolverRegistry};
use crate::targets::{instantiate_all, TargetRegistry};

#[derive(Args)]
pub struct CheckArgs {
    /// Overrides: group=option, key=value, +key=value, ++key=value, ~key
    #[arg(value_name = "OVERRIDES")]
    pub overrides: Vec<String>,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Primary config to compose
    #[arg(short = 'n', long, value_name = "NAME")]
    pub config_name: Option<String>,
}

pub fn run(args: CheckArgs) -> Result<()> {
    let cli_overrides =
        CliOverrides { config_name: args.config_name.clone(), ..CliOverrides::default() };
    let settings = load_run_settings(&args.source, cli_overrides)?;
    let composition = compose_from_settings(&settings, &args.overrides)?;

    let missing = missing_values(&composition.config);
    if !missing.is_empty() {
        anyhow::bail!("Mandatory values not set: {}", missing.join(", "));
    }

    let tree = resolve(&composition.config, &ResolverRegistry::default())
        .context("Failed resolving interpolations")?;
    let experiment =
        ExperimentConfig::from_tree(&tree).context("Invalid experiment configuration")?;
    experiment.validate().context("Invalid experiment configuration")?;
    let components = instantiate_all(&tree, &TargetRegistry::default())
        .context("Failed instantiating components")?;
    let fingerprint = tree_fingerprint(&tree)?;

    let report = CheckReport {
        config_name: &settings.config_name,
        overrides: &args.overrides,
        fragments: composition.trace.len(),
        experiment: &experiment,
        components: &components,
        fingerprint: &fingerprint,
    };
    print!("{}", render_check_report(&report));
    Ok(())
}
