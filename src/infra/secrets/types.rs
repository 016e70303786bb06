//! Path helpers for environment-scoped secret lookups.

/// Separator between the environment scope and the secret path.
pub const SCOPE_SEPARATOR: char = '/';

/// Normalize an environment scope: strip surrounding separators and treat an
/// empty result as no scope at all.
pub fn normalize_environment(environment: Option<&str>) -> Option<String> {
    let env = environment?.trim().trim_matches(SCOPE_SEPARATOR);
    if env.is_empty() {
        None
    } else {
        Some(env.to_string())
    }
}

/// The key actually presented to the secret store.
pub fn scoped_path(environment: Option<&str>, path: &str) -> String {
    match environment {
        Some(env) => format!("{env}{SCOPE_SEPARATOR}{path}"),
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_separators() {
        assert_eq!(normalize_environment(Some("/prod/")), Some("prod".into()));
        assert_eq!(
            normalize_environment(Some("team/dev/")),
            Some("team/dev".into())
        );
    }

    #[test]
    fn normalize_empty_is_unset() {
        assert_eq!(normalize_environment(Some("//")), None);
        assert_eq!(normalize_environment(Some("")), None);
        assert_eq!(normalize_environment(None), None);
    }

    #[test]
    fn scoped_path_with_and_without_environment() {
        assert_eq!(scoped_path(Some("prod"), "ssh/work"), "prod/ssh/work");
        assert_eq!(scoped_path(None, "ssh/work"), "ssh/work");
    }
}
