//! Human-readable composition trace

use std::fmt::Write;

use crate::compose::TraceEntry;

/// One line per applied fragment, in merge order.
pub fn render_trace(trace: &[TraceEntry]) -> String {
    let width = trace.iter().map(|e| e.fragment.to_string().len()).max().unwrap_or(0);
    let mut out = String::new();
    for (i, entry) in trace.iter().enumerate() {
        let package = if entry.package.is_empty() { "<root>" } else { entry.package.as_str() };
        let _ = write!(
            out,
            "{:>3}. {:<width$}  @ {:<16} {}",
            i + 1,
            entry.fragment.to_string(),
            package,
            entry.origin,
        );
        if let Some(by) = &entry.selected_by {
            let _ = write!(out, "  (override from {by})");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FragmentId;

    #[test]
    fn test_trace_lines_in_order() {
        let trace = vec![
            TraceEntry {
                fragment: FragmentId::new("", "config"),
                package: String::new(),
                origin: "configs/config.yaml".into(),
                selected_by: None,
            },
            TraceEntry {
                fragment: FragmentId::new("algo", "dreamer_v3_S"),
                package: "algo".into(),
                origin: "configs/algo/dreamer_v3_S.yaml".into(),
                selected_by: Some("exp/dreamer_v3".into()),
            },
        ];
        let out = render_trace(&trace);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("  1. config"));
        assert!(lines[0].contains("@ <root>"));
        assert!(lines[1].contains("algo/dreamer_v3_S"));
        assert!(lines[1].ends_with("(override from exp/dreamer_v3)"));
    }
}
