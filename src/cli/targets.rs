//! Targets command implementation

use anyhow::Result;
use clap::Args;

use crate::targets::TargetRegistry;

#[derive(Args)]
pub struct TargetsArgs {}

pub fn run(_args: TargetsArgs) -> Result<()> {
    for target in TargetRegistry::default().targets() {
        println!("{target}");
    }
    Ok(())
}
