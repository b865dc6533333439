// capability.rs — Capability set definitions.
//
// A capability set declares what a compilation run may use: builtin
// functions, language features, network hosts, future keywords and
// wasm ABI versions. The compiler rejects anything outside it.
//
// Collections are plain vectors. Merging two sets concatenates them
// without deduplication; duplicates are harmless downstream.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CapabilityError, CapabilitySource};

/// Type signature of a builtin function.
///
/// Argument and result types are kept as raw JSON: the compiler only needs
/// the arity, and keeping the original shape means a loaded file can be
/// re-serialized without loss.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FunctionDecl {
    /// Positional argument types.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,

    /// Result type, absent for builtins with no return value (e.g. `print`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Type of trailing variadic arguments, if the builtin accepts any number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variadic: Option<serde_json::Value>,
}

/// A builtin function the policy may call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuiltinDecl {
    /// Dotted name, e.g. "count" or "http.send".
    pub name: String,

    /// Signature, absent in hand-written capability files that only list names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decl: Option<FunctionDecl>,

    /// Operator form for infix builtins (e.g. "==" for `equal`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infix: Option<String>,
}

impl BuiltinDecl {
    /// Whether a call site with `arg_count` arguments fits this declaration.
    ///
    /// A call may pass one extra trailing argument that captures the result.
    /// Declarations without a signature accept any arity.
    pub fn accepts_arity(&self, arg_count: usize) -> bool {
        match &self.decl {
            None => true,
            Some(decl) if decl.variadic.is_some() => arg_count >= decl.args.len(),
            Some(decl) => arg_count == decl.args.len() || arg_count == decl.args.len() + 1,
        }
    }
}

/// A supported wasm ABI version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct WasmAbiVersion {
    pub version: u32,
    pub minor_version: u32,
}

/// The complete set of language features a build may use.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CapabilitySet {
    /// Callable builtin functions.
    #[serde(default)]
    pub builtins: Vec<BuiltinDecl>,

    /// Named language features (e.g. "rego_v1_import").
    #[serde(default)]
    pub features: Vec<String>,

    /// Hosts network builtins may reach. `None` allows every host,
    /// `Some(vec![])` allows none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_net: Option<Vec<String>>,

    /// Keywords that may be imported from `future.keywords`.
    #[serde(default)]
    pub future_keywords: Vec<String>,

    /// Wasm ABI versions the wasm target may emit.
    #[serde(default)]
    pub wasm_abi_versions: Vec<WasmAbiVersion>,
}

impl CapabilitySet {
    /// Parse a capability set from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a capability set from a JSON file.
    ///
    /// A missing, unreadable or malformed file is a load error tagged with
    /// [`CapabilitySource::File`].
    pub fn load_file(path: &Path) -> Result<Self, CapabilityError> {
        let load_error = |detail: String| CapabilityError::Load {
            origin: CapabilitySource::File,
            name: path.display().to_string(),
            detail,
        };

        let content = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let caps = Self::from_json(&content).map_err(|e| load_error(format!("invalid JSON: {}", e)))?;

        tracing::debug!(
            path = %path.display(),
            builtins = caps.builtins.len(),
            "loaded capabilities file"
        );
        Ok(caps)
    }

    /// Merge two capability sets into a new one.
    ///
    /// Every collection is `self` followed by `other`. Nothing is
    /// deduplicated and neither input is modified. `allow_net` stays `None`
    /// only when both inputs are `None`.
    pub fn merge(&self, other: &CapabilitySet) -> CapabilitySet {
        let allow_net = match (&self.allow_net, &other.allow_net) {
            (None, None) => None,
            (a, b) => Some(
                a.iter()
                    .flatten()
                    .chain(b.iter().flatten())
                    .cloned()
                    .collect(),
            ),
        };

        CapabilitySet {
            builtins: concat(&self.builtins, &other.builtins),
            features: concat(&self.features, &other.features),
            allow_net,
            future_keywords: concat(&self.future_keywords, &other.future_keywords),
            wasm_abi_versions: concat(&self.wasm_abi_versions, &other.wasm_abi_versions),
        }
    }

    /// Find a builtin by name. With duplicates, the first declaration wins.
    pub fn builtin(&self, name: &str) -> Option<&BuiltinDecl> {
        self.builtins.iter().find(|b| b.name == name)
    }

    /// Whether a named feature is enabled.
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    /// Whether `keyword` may be imported from `future.keywords`.
    pub fn allows_future_keyword(&self, keyword: &str) -> bool {
        self.future_keywords.iter().any(|k| k == keyword)
    }

    /// Whether network builtins may reach `host`.
    pub fn allows_host(&self, host: &str) -> bool {
        match &self.allow_net {
            None => true,
            Some(hosts) => hosts.iter().any(|h| h == host),
        }
    }

    /// The highest wasm ABI version available, if any.
    pub fn latest_wasm_abi(&self) -> Option<WasmAbiVersion> {
        self.wasm_abi_versions.iter().copied().max()
    }
}

fn concat<T: Clone>(a: &[T], b: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    out.extend_from_slice(a);
    out.extend_from_slice(b);
    out
}
