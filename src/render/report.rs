//! `check` report

use console::style;

use crate::domain::ExperimentConfig;
use crate::targets::Instantiated;

/// Everything `check` learned about one composed run.
pub struct CheckReport<'a> {
    pub config_name: &'a str,
    pub overrides: &'a [String],
    pub fragments: usize,
    pub experiment: &'a ExperimentConfig,
    pub components: &'a [Instantiated],
    pub fingerprint: &'a str,
}

pub fn render_check_report(report: &CheckReport<'_>) -> String {
    let exp = report.experiment;
    let mut lines = Vec::new();

    lines.push(format!("{} {}", style("✓").green().bold(), style(report.config_name).bold()));
    if !report.overrides.is_empty() {
        lines.push(format!("  overrides:    {}", report.overrides.join(" ")));
    }
    lines.push(format!("  fragments:    {}", report.fragments));
    lines.push(format!("  algorithm:    {}", exp.algo.name));
    lines.push(format!("  environment:  {} (x{})", exp.env.id, exp.env.num_envs));
    lines.push(format!("  observations: {}", exp.observation_keys().join(", ")));
    lines.push(format!("  seed:         {}", exp.seed));
    lines.push(format!("  components:   {}", report.components.len()));
    for built in report.components {
        let path = if built.path.is_empty() { "<root>" } else { built.path.as_str() };
        lines.push(format!(
            "    {:<40} {:<10} {}",
            path,
            built.component.kind(),
            style(built.component.summary()).dim()
        ));
    }
    lines.push(format!("  fingerprint:  {}", style(report.fingerprint).cyan()));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
