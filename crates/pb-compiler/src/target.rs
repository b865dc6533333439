// target.rs — Output targets.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// What a compilation produces inside the bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Target {
    /// Rego sources and data only.
    #[default]
    Rego,
    /// Sources plus `plan.json`.
    Plan,
    /// Sources plus `policy.wasm`.
    Wasm,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported target '{0}' (expected one of: rego, bundle, plan, wasm)")]
pub struct UnknownTarget(pub String);

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Rego => "rego",
            Target::Plan => "plan",
            Target::Wasm => "wasm",
        }
    }
}

impl FromStr for Target {
    type Err = UnknownTarget;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rego" | "bundle" => Ok(Target::Rego),
            "plan" => Ok(Target::Plan),
            "wasm" => Ok(Target::Wasm),
            _ => Err(UnknownTarget(s.to_string())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
