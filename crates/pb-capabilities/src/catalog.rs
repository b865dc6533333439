// catalog.rs — Capability sets for released compiler versions.
//
// Each released version ships a capabilities document embedded in the
// binary. The newest entry doubles as the process default, parsed once
// on first use and shared read-only afterwards.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::capability::CapabilitySet;
use crate::error::{CapabilityError, CapabilitySource};

/// Released versions, oldest first. The last entry is the default.
const RELEASES: &[(&str, &str)] = &[
    ("v0.50.0", include_str!("../capabilities/v0.50.0.json")),
    ("v0.53.1", include_str!("../capabilities/v0.53.1.json")),
    ("v0.59.0", include_str!("../capabilities/v0.59.0.json")),
];

static DEFAULT_CAPABILITIES: Lazy<Arc<CapabilitySet>> = Lazy::new(|| {
    let (version, _) = RELEASES[RELEASES.len() - 1];
    match for_version(version) {
        Ok(caps) => Arc::new(caps),
        Err(e) => {
            // Only reachable if a shipped document is broken; the catalog
            // tests parse every entry.
            tracing::error!("{}", e);
            Arc::new(CapabilitySet::default())
        }
    }
});

/// Names of every released version in the catalog, oldest first.
pub fn known_versions() -> Vec<&'static str> {
    RELEASES.iter().map(|(v, _)| *v).collect()
}

/// The version whose capabilities are the process default.
pub fn current_version() -> &'static str {
    RELEASES[RELEASES.len() - 1].0
}

/// Load the capability set of a released version.
///
/// Unknown versions fail with a [`CapabilitySource::Version`] load error.
pub fn for_version(version: &str) -> Result<CapabilitySet, CapabilityError> {
    let (_, document) = RELEASES
        .iter()
        .find(|(v, _)| *v == version)
        .ok_or_else(|| CapabilityError::Load {
            origin: CapabilitySource::Version,
            name: version.to_string(),
            detail: format!("version not found (known: {})", known_versions().join(", ")),
        })?;

    CapabilitySet::from_json(document).map_err(|e| CapabilityError::Catalog {
        version: version.to_string(),
        reason: e.to_string(),
    })
}

/// The shared default capability set.
///
/// Every call returns a clone of the same `Arc`, so callers can compare
/// with `Arc::ptr_eq`.
pub fn default_capabilities() -> Arc<CapabilitySet> {
    Arc::clone(&DEFAULT_CAPABILITIES)
}
