// error.rs — Error types for capability loading and resolution.

use std::fmt;

use thiserror::Error;

/// Which capability source failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilitySource {
    /// A capabilities JSON file on disk.
    File,
    /// A named entry in the built-in release catalog.
    Version,
}

impl fmt::Display for CapabilitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilitySource::File => write!(f, "file"),
            CapabilitySource::Version => write!(f, "version"),
        }
    }
}

/// Errors that can occur while loading or resolving capabilities.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// A file-backed or version-named capability set could not be loaded.
    #[error("failed to load capabilities from {origin} '{name}': {detail}")]
    Load {
        origin: CapabilitySource,
        name: String,
        detail: String,
    },

    /// An embedded catalog document is malformed (a packaging defect).
    #[error("embedded capabilities for {version} are malformed: {reason}")]
    Catalog { version: String, reason: String },
}

impl CapabilityError {
    /// Which source failed, if this is a load error.
    pub fn failed_source(&self) -> Option<CapabilitySource> {
        match self {
            CapabilityError::Load { origin, .. } => Some(*origin),
            CapabilityError::Catalog { .. } => None,
        }
    }
}
