// manifest.rs — The `.manifest` bundle entry.

use serde::{Deserialize, Serialize};

use crate::error::BundleError;

pub const MANIFEST_FILE: &str = ".manifest";

/// Maps a wasm entrypoint to the module that implements it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasmResolver {
    pub entrypoint: String,
    pub module: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub revision: String,

    /// Data paths owned by the bundle. Absent means the whole tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roots: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wasm: Vec<WasmResolver>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rego_version: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Manifest {
    pub fn parse(path: &str, bytes: &[u8]) -> Result<Self, BundleError> {
        serde_json::from_slice(bytes).map_err(|e| BundleError::Manifest {
            path: path.to_string(),
            detail: e.to_string(),
        })
    }

    /// Roots with the implicit default filled in.
    pub fn effective_roots(&self) -> Vec<String> {
        self.roots.clone().unwrap_or_else(|| vec![String::new()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_manifest() {
        let m = Manifest::parse(".manifest", br#"{"revision": "abc123"}"#).unwrap();
        assert_eq!(m.revision, "abc123");
        assert_eq!(m.effective_roots(), vec![String::new()]);
    }

    #[test]
    fn parses_roots_and_wasm() {
        let m = Manifest::parse(
            ".manifest",
            br#"{"roots": ["authz"], "wasm": [{"entrypoint": "authz/allow", "module": "/policy.wasm"}]}"#,
        )
        .unwrap();
        assert_eq!(m.roots, Some(vec!["authz".to_string()]));
        assert_eq!(m.wasm[0].module, "/policy.wasm");
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let err = Manifest::parse("bundle/.manifest", b"[]").unwrap_err();
        assert!(err.to_string().starts_with("invalid manifest bundle/.manifest"));
    }
}
