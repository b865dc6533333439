//! Build configuration from `pbuild.toml`.
//!
//! Every field is optional in the file. Command-line flags override the
//! values loaded here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::request::{BuildRequest, Source};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "pbuild.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Output target: "rego", "bundle", "plan" or "wasm".
    #[serde(default = "default_target")]
    pub target: String,

    /// Treat directory sources as bundle roots.
    #[serde(default)]
    pub bundle_mode: bool,

    /// Release whose capabilities to compile against.
    pub capabilities_version: Option<String>,

    /// Capabilities JSON file. Relative paths are resolved against the
    /// directory of the config file.
    pub capabilities_file: Option<PathBuf>,

    #[serde(default)]
    pub entrypoints: Vec<String>,

    /// Glob patterns skipped while loading sources.
    #[serde(default)]
    pub ignore: Vec<String>,

    #[serde(default)]
    pub prune_unused: bool,

    pub revision: Option<String>,

    #[serde(default)]
    pub debug: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            bundle_mode: false,
            capabilities_version: None,
            capabilities_file: None,
            entrypoints: Vec::new(),
            ignore: Vec::new(),
            prune_unused: false,
            revision: None,
            debug: false,
        }
    }
}

fn default_target() -> String {
    "rego".to_string()
}

impl BuildConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: BuildConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let (Some(file), Some(dir)) = (config.capabilities_file.as_mut(), path.parent()) {
            if file.is_relative() {
                *file = dir.join(&*file);
            }
        }
        tracing::debug!(path = %path.display(), "loaded build config");
        Ok(config)
    }

    /// Load config, returning the default if the file doesn't exist.
    /// A file that exists but cannot be read or parsed is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// A request for `sources` carrying every configured option.
    pub fn to_request(&self, sources: Vec<Source>) -> BuildRequest {
        let mut request = BuildRequest::with_sources(sources, self.target.clone())
            .bundle_mode(self.bundle_mode)
            .entrypoints(self.entrypoints.iter().cloned())
            .ignore(self.ignore.iter().cloned())
            .prune_unused(self.prune_unused)
            .debug(self.debug);
        request.capabilities_file = self.capabilities_file.clone();
        request.capabilities_version = self.capabilities_version.clone();
        request.revision = self.revision.clone();
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_when_file_is_empty() {
        let config: BuildConfig = toml::from_str("").unwrap();
        assert_eq!(config, BuildConfig::default());
        assert_eq!(config.target, "rego");
    }

    #[test]
    fn missing_file_yields_default() {
        let dir = tempdir().unwrap();
        let config = BuildConfig::load_or_default(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, BuildConfig::default());
    }

    #[test]
    fn loads_fields_and_resolves_capabilities_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
target = "wasm"
bundle_mode = true
capabilities_version = "v0.53.1"
capabilities_file = "caps.json"
entrypoints = ["authz/allow"]
ignore = [".*", "*_test.rego"]
prune_unused = true
revision = "abc"
"#,
        )
        .unwrap();

        let config = BuildConfig::load(&path).unwrap();
        assert_eq!(config.target, "wasm");
        assert!(config.bundle_mode);
        assert_eq!(config.capabilities_file, Some(dir.path().join("caps.json")));
        assert_eq!(config.ignore.len(), 2);

        let request = config.to_request(vec![Source::Path(PathBuf::from("policies"))]);
        assert_eq!(request.target, "wasm");
        assert!(request.prune_unused);
        assert_eq!(request.effective_capabilities_version(), Some("v0.53.1"));
        assert_eq!(request.revision.as_deref(), Some("abc"));
        assert_eq!(request.effective_entrypoints(), vec!["authz/allow"]);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "target = [").unwrap();
        let err = BuildConfig::load_or_default(&path).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse config"));
    }
}
