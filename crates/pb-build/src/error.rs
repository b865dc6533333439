// error.rs — Build and configuration errors.
//
// Every failure of a build becomes one BuildError. At the outcome it is
// rendered to a single message; the variants exist so Rust callers can
// still tell the failure classes apart.

use std::path::PathBuf;

use pb_bundle::BundleError;
use pb_capabilities::CapabilityError;
use pb_compiler::Diagnostics;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// The request is malformed. Detected before any I/O.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The capabilities file or version could not be loaded.
    #[error(transparent)]
    CapabilityLoad(#[from] CapabilityError),

    /// Sources failed to parse, type-check or satisfy the capabilities.
    /// Displays the compiler diagnostics verbatim.
    #[error("{0}")]
    Compilation(#[from] Diagnostics),

    /// A source path could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Sources could not be assembled or the bundle could not be written.
    #[error("{0}")]
    Bundle(BundleError),
}

impl BuildError {
    /// Short machine-friendly name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            BuildError::InvalidRequest(_) => "invalid_request",
            BuildError::CapabilityLoad(_) => "capability_load",
            BuildError::Compilation(_) => "compilation",
            BuildError::Io { .. } => "io",
            BuildError::Bundle(_) => "bundle",
        }
    }
}

impl From<BundleError> for BuildError {
    fn from(e: BundleError) -> Self {
        match e {
            BundleError::Io { path, source } => BuildError::Io { path, source },
            other => BuildError::Bundle(other),
        }
    }
}

/// Errors loading `pbuild.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
