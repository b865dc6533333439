// request.rs — Build requests.
//
// A request is built once by the caller and read-only afterwards. The
// pipeline validates it before touching the filesystem.

use std::path::PathBuf;

use pb_bundle::SourceInput;
use pb_compiler::Target;

use crate::error::BuildError;

/// Logical path given to policy text built without a file.
pub const INLINE_MODULE_PATH: &str = "policy.rego";

/// One input of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A directory, policy file, data document or bundle archive.
    Path(PathBuf),
    /// Policy text with the logical path it is compiled and bundled under.
    Inline { path: String, text: String },
}

impl Source {
    pub(crate) fn to_input(&self) -> SourceInput {
        match self {
            Source::Path(path) => SourceInput::Path(path.clone()),
            Source::Inline { path, text } => SourceInput::Inline {
                path: path.clone(),
                text: text.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub sources: Vec<Source>,
    /// Output target name: `rego` (alias `bundle`), `plan` or `wasm`.
    pub target: String,
    pub capabilities_file: Option<PathBuf>,
    pub capabilities_version: Option<String>,
    pub bundle_mode: bool,
    /// Requested entrypoints. Blank entries are dropped before use.
    pub entrypoints: Vec<String>,
    pub debug: bool,
    /// Leave modules that define no reachable rule out of the bundle.
    pub prune_unused: bool,
    /// Glob patterns for files and directories to skip while loading.
    pub ignore: Vec<String>,
    /// Revision written into the bundle manifest.
    pub revision: Option<String>,
}

impl BuildRequest {
    /// Request building one path for `target`.
    pub fn new(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self::with_sources(vec![Source::Path(source.into())], target)
    }

    /// Request building policy text, compiled as [`INLINE_MODULE_PATH`].
    pub fn from_text(text: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_sources(
            vec![Source::Inline {
                path: INLINE_MODULE_PATH.to_string(),
                text: text.into(),
            }],
            target,
        )
    }

    pub fn with_sources(sources: Vec<Source>, target: impl Into<String>) -> Self {
        Self {
            sources,
            target: target.into(),
            capabilities_file: None,
            capabilities_version: None,
            bundle_mode: false,
            entrypoints: Vec::new(),
            debug: false,
            prune_unused: false,
            ignore: Vec::new(),
            revision: None,
        }
    }

    pub fn add_source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    pub fn capabilities_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.capabilities_file = Some(path.into());
        self
    }

    pub fn capabilities_version(mut self, version: impl Into<String>) -> Self {
        self.capabilities_version = Some(version.into());
        self
    }

    pub fn bundle_mode(mut self, enabled: bool) -> Self {
        self.bundle_mode = enabled;
        self
    }

    pub fn entrypoints<I, S>(mut self, entrypoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entrypoints = entrypoints.into_iter().map(Into::into).collect();
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn prune_unused(mut self, enabled: bool) -> Self {
        self.prune_unused = enabled;
        self
    }

    pub fn ignore<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Requested entrypoints with blank names removed and the rest trimmed.
    pub fn effective_entrypoints(&self) -> Vec<String> {
        self.entrypoints
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Capabilities version, treating a blank tag as absent.
    pub fn effective_capabilities_version(&self) -> Option<&str> {
        self.capabilities_version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Capabilities file, treating an empty path as absent.
    pub fn effective_capabilities_file(&self) -> Option<&std::path::Path> {
        self.capabilities_file
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Check the request and parse its target.
    pub fn validate(&self) -> Result<Target, BuildError> {
        if self.sources.is_empty() {
            return Err(BuildError::InvalidRequest("no sources given".to_string()));
        }
        for source in &self.sources {
            match source {
                Source::Path(path) if path.as_os_str().is_empty() => {
                    return Err(BuildError::InvalidRequest("source path is empty".to_string()));
                }
                Source::Inline { path, .. } if path.trim().is_empty() => {
                    return Err(BuildError::InvalidRequest(
                        "inline source has no module path".to_string(),
                    ));
                }
                _ => {}
            }
        }
        self.target
            .parse::<Target>()
            .map_err(|e| BuildError::InvalidRequest(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let req = BuildRequest::new("policies", "bundle")
            .bundle_mode(true)
            .capabilities_version("v0.53.1")
            .entrypoints(["example/allow"])
            .revision("r1")
            .debug(true);
        assert_eq!(req.sources, vec![Source::Path(PathBuf::from("policies"))]);
        assert!(req.bundle_mode);
        assert_eq!(req.effective_capabilities_version(), Some("v0.53.1"));
        assert_eq!(req.revision.as_deref(), Some("r1"));
        assert_eq!(req.validate().unwrap(), Target::Rego);
    }

    #[test]
    fn blank_entrypoints_are_dropped() {
        let req = BuildRequest::new("p", "rego").entrypoints(["", "  ", "a/b", " c/d "]);
        assert_eq!(req.effective_entrypoints(), vec!["a/b", "c/d"]);
    }

    #[test]
    fn blank_capability_sources_are_absent() {
        let req = BuildRequest::new("p", "rego")
            .capabilities_version("  ")
            .capabilities_file("");
        assert_eq!(req.effective_capabilities_version(), None);
        assert_eq!(req.effective_capabilities_file(), None);
    }

    #[test]
    fn rejects_missing_sources() {
        let req = BuildRequest::with_sources(vec![], "rego");
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "invalid request: no sources given");
    }

    #[test]
    fn rejects_empty_path() {
        let err = BuildRequest::new("", "rego").validate().unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn rejects_unknown_target() {
        let err = BuildRequest::new("p", "x86").validate().unwrap_err();
        assert!(err.to_string().contains("unsupported target 'x86'"));
    }

    #[test]
    fn from_text_uses_inline_module() {
        let req = BuildRequest::from_text("package p", "wasm");
        assert!(matches!(&req.sources[0], Source::Inline { path, .. } if path == INLINE_MODULE_PATH));
        assert_eq!(req.validate().unwrap(), Target::Wasm);
    }
}
