// ignore.rs — Ignore patterns applied while loading sources.
//
// Patterns are globs matched against the name of each file or directory
// and against its path relative to the source root. An ignored directory
// is not descended into.

use glob::Pattern;

use crate::error::BundleError;

#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<Pattern>,
}

impl IgnoreSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, BundleError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|e| BundleError::InvalidPattern {
                    pattern: p.as_ref().to_string(),
                    detail: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether an entry with this `/`-separated relative path is ignored.
    pub fn is_ignored(&self, relative: &str) -> bool {
        let name = relative.rsplit('/').next().unwrap_or(relative);
        self.patterns
            .iter()
            .any(|p| p.matches(name) || p.matches(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_names_and_relative_paths() {
        let set = IgnoreSet::new(&["*_test.rego", "vendor", "lib/tmp/*"]).unwrap();
        assert!(set.is_ignored("authz_test.rego"));
        assert!(set.is_ignored("nested/authz_test.rego"));
        assert!(set.is_ignored("vendor"));
        assert!(set.is_ignored("lib/tmp/x.rego"));
        assert!(!set.is_ignored("authz.rego"));
        assert!(!set.is_ignored("lib/x.rego"));
    }

    #[test]
    fn empty_set_ignores_nothing() {
        let set = IgnoreSet::new::<&str>(&[]).unwrap();
        assert!(set.is_empty());
        assert!(!set.is_ignored("anything"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = IgnoreSet::new(&["[unclosed"]).unwrap_err();
        assert!(matches!(err, BundleError::InvalidPattern { .. }));
        assert!(err.to_string().contains("[unclosed"));
    }
}
