// resolver.rs — Effective capability set for one build.
//
// Resolution rules:
// 1. A capabilities file, if given, is loaded first; failure stops resolution.
// 2. A release version, if given, is looked up; failure stops resolution.
// 3. Neither → the shared default, returned as-is.
// 4. Exactly one → that set.
// 5. Both → file merged with version into a fresh set.
//
// Load errors are never swallowed in favor of the default.

use std::path::Path;
use std::sync::Arc;

use crate::capability::CapabilitySet;
use crate::catalog;
use crate::error::CapabilityError;

/// Resolves the capability set a build compiles against.
///
/// Holds only the immutable default, so one resolver can be shared by any
/// number of concurrent builds.
#[derive(Debug, Clone)]
pub struct CapabilityResolver {
    default: Arc<CapabilitySet>,
}

impl CapabilityResolver {
    /// Resolver backed by the process-wide default capabilities.
    pub fn new() -> Self {
        Self {
            default: catalog::default_capabilities(),
        }
    }

    /// Resolver with a caller-provided default (used by tests and embedders
    /// pinning an older release).
    pub fn with_default(default: Arc<CapabilitySet>) -> Self {
        Self { default }
    }

    /// The set returned when no explicit source is given.
    pub fn default_set(&self) -> &Arc<CapabilitySet> {
        &self.default
    }

    /// Produce the effective capability set.
    pub fn resolve(
        &self,
        file: Option<&Path>,
        version: Option<&str>,
    ) -> Result<Arc<CapabilitySet>, CapabilityError> {
        let from_file = file.map(CapabilitySet::load_file).transpose()?;
        let from_version = version.map(catalog::for_version).transpose()?;

        let resolved = match (from_file, from_version) {
            (None, None) => {
                tracing::debug!("using default capabilities");
                return Ok(Arc::clone(&self.default));
            }
            (Some(caps), None) | (None, Some(caps)) => caps,
            (Some(file_caps), Some(version_caps)) => {
                tracing::debug!(
                    file_builtins = file_caps.builtins.len(),
                    version_builtins = version_caps.builtins.len(),
                    "merging file and version capabilities"
                );
                file_caps.merge(&version_caps)
            }
        };

        Ok(Arc::new(resolved))
    }
}

impl Default for CapabilityResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapabilitySource;
    use tempfile::tempdir;

    const CUSTOM_CAPS: &str = r#"{
        "builtins": [
            {"name": "custom.lookup", "decl": {"args": [{"type": "string"}], "result": {"type": "any"}}}
        ],
        "features": ["custom_feature"],
        "allow_net": ["api.example.com"]
    }"#;

    #[test]
    fn neither_source_returns_default_by_reference() {
        let resolver = CapabilityResolver::new();
        let caps = resolver.resolve(None, None).unwrap();
        assert!(Arc::ptr_eq(&caps, resolver.default_set()));
        assert!(Arc::ptr_eq(&caps, &catalog::default_capabilities()));
    }

    #[test]
    fn version_only_returns_catalog_set() {
        let resolver = CapabilityResolver::new();
        let caps = resolver.resolve(None, Some("v0.50.0")).unwrap();
        assert_eq!(*caps, catalog::for_version("v0.50.0").unwrap());
    }

    #[test]
    fn file_only_returns_file_set() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("caps.json");
        std::fs::write(&path, CUSTOM_CAPS).unwrap();

        let caps = CapabilityResolver::new().resolve(Some(&path), None).unwrap();
        assert_eq!(caps.builtins.len(), 1);
        assert!(caps.has_feature("custom_feature"));
    }

    #[test]
    fn both_sources_are_merged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("caps.json");
        std::fs::write(&path, CUSTOM_CAPS).unwrap();
        let version = catalog::for_version("v0.53.1").unwrap();

        let caps = CapabilityResolver::new()
            .resolve(Some(&path), Some("v0.53.1"))
            .unwrap();
        assert_eq!(caps.builtins.len(), 1 + version.builtins.len());
        // File entries come first.
        assert_eq!(caps.builtins[0].name, "custom.lookup");
        assert!(caps.builtin("count").is_some());
        assert_eq!(
            caps.future_keywords.len(),
            version.future_keywords.len()
        );
    }

    #[test]
    fn unreadable_file_fails_without_fallback() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = CapabilityResolver::new()
            .resolve(Some(&missing), None)
            .unwrap_err();
        assert_eq!(err.failed_source(), Some(CapabilitySource::File));
    }

    #[test]
    fn bad_file_fails_even_with_valid_version() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = CapabilityResolver::new()
            .resolve(Some(&missing), Some("v0.53.1"))
            .unwrap_err();
        assert_eq!(err.failed_source(), Some(CapabilitySource::File));
    }

    #[test]
    fn unknown_version_fails() {
        let err = CapabilityResolver::new()
            .resolve(None, Some("nonexistent-version-xyz"))
            .unwrap_err();
        assert_eq!(err.failed_source(), Some(CapabilitySource::Version));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn custom_default_is_honored() {
        let pinned = Arc::new(catalog::for_version("v0.50.0").unwrap());
        let resolver = CapabilityResolver::with_default(Arc::clone(&pinned));
        let caps = resolver.resolve(None, None).unwrap();
        assert!(Arc::ptr_eq(&caps, &pinned));
    }
}
