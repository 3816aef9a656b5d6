//! Compose command implementation

use anyhow::{Context, Result};
use clap::Args;

use super::utils::{compose_from_settings, load_run_settings, parse_format, SourceArgs};
use crate::config::CliOverrides;
use crate::render::{render_trace, render_tree};
use crate::resolve::{resolve, ResolverRegistry};
use crate::utils::get_path;

#[derive(Args)]
pub struct ComposeArgs {
    /// Overrides: group=option, key=value, +key=value, ++key=value, ~key
    #[arg(value_name = "OVERRIDES")]
    pub overrides: Vec<String>,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Primary config to compose
    #[arg(short = 'n', long, value_name = "NAME")]
    pub config_name: Option<String>,

    /// Output format: yaml|json
    #[arg(short = 'f', long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Print interpolations as written instead of resolving them
    #[arg(long)]
    pub no_resolve: bool,

    /// Print only the sub-tree at this dotted path
    #[arg(long, value_name = "PATH")]
    pub select: Option<String>,

    /// Print the fragments applied, in merge order, to stderr
    #[arg(long)]
    pub trace: bool,
}

pub fn run(args: ComposeArgs) -> Result<()> {
    let cli_overrides = CliOverrides {
        search_paths: None,
        config_name: args.config_name.clone(),
        format: parse_format(args.format.as_deref())?,
        resolve: if args.no_resolve { Some(false) } else { None },
    };
    let settings = load_run_settings(&args.source, cli_overrides)?;
    let composition = compose_from_settings(&settings, &args.overrides)?;

    if args.trace {
        eprint!("{}", render_trace(&composition.trace));
    }

    let tree = if settings.resolve {
        resolve(&composition.config, &ResolverRegistry::default())
            .context("Failed resolving interpolations")?
    } else {
        composition.config
    };

    let selected = match args.select.as_deref() {
        Some(path) => get_path(&tree, path)
            .with_context(|| format!("Key '{path}' is not in the composed configuration"))?,
        None => &tree,
    };

    print!("{}", render_tree(selected, settings.format)?);
    Ok(())
}
