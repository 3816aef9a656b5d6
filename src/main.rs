//! rl-compose: compose layered YAML experiment configurations
//!
//! Builds one experiment configuration from a tree of reusable fragments
//! (defaults lists, group overrides, packages), resolves `${...}`
//! interpolations and checks the result against the experiment schema.

use anyhow::Result;

mod cli;
mod compose;
mod config;
mod domain;
mod render;
mod resolve;
mod source;
mod targets;
mod utils;

fn main() -> Result<()> {
    cli::run()
}
