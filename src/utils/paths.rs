//! Group path normalization

/// Normalize a group path: forward slashes, no leading/trailing separators,
/// no empty segments.
pub fn normalize_group(path: &str) -> String {
    path.replace('\\', "/").split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("/")
}

/// Join a parent group with a child group path. A leading `/` on the child
/// makes it absolute.
pub fn join_group(parent: &str, child: &str) -> String {
    if child.starts_with('/') {
        return normalize_group(child);
    }
    if parent.is_empty() {
        normalize_group(child)
    } else {
        normalize_group(&format!("{parent}/{child}"))
    }
}

/// Default package of a fragment living in `group` (`env/dmc` -> `env.dmc`).
pub fn package_from_group(group: &str) -> String {
    normalize_group(group).replace('/', ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_group_relative_and_absolute() {
        assert_eq!(join_group("algo", "optim"), "algo/optim");
        assert_eq!(join_group("exp", "/algo"), "algo");
        assert_eq!(join_group("", "env"), "env");
        assert_eq!(join_group("", "/env//dmc/"), "env/dmc");
    }

    #[test]
    fn test_package_from_group() {
        assert_eq!(package_from_group("env/dmc"), "env.dmc");
        assert_eq!(package_from_group(""), "");
    }
}
