// annotations.rs — METADATA comment blocks.
//
// A comment block whose first line is `# METADATA` holds YAML describing
// the statement that follows it. The compiler only acts on `entrypoint`;
// the remaining fields are parsed so malformed blocks are reported.

use serde::{Deserialize, Serialize};

use crate::error::{Diagnostic, ErrorKind};

const SCOPES: &[&str] = &["rule", "document", "package", "subpackages"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Marks the annotated rule or package as a build entrypoint.
    #[serde(default)]
    pub entrypoint: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<serde_yaml::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_yaml::Mapping>,
}

/// Whether a comment line opens a METADATA block.
pub fn is_metadata_marker(comment: &str) -> bool {
    comment.trim() == "METADATA"
}

/// Parse the comment lines that follow a `# METADATA` marker.
///
/// `line` is the line of the marker, used for diagnostics.
pub fn parse_block(file: &str, line: usize, comments: &[String]) -> Result<Annotations, Diagnostic> {
    let yaml = comments
        .iter()
        .map(|c| c.strip_prefix(' ').unwrap_or(c))
        .collect::<Vec<_>>()
        .join("\n");

    if yaml.trim().is_empty() {
        return Ok(Annotations::default());
    }

    let annotations: Annotations = serde_yaml::from_str(&yaml).map_err(|e| {
        Diagnostic::new(ErrorKind::Parse, file, line, format!("yaml: {}", e))
    })?;

    if let Some(scope) = &annotations.scope {
        if !SCOPES.contains(&scope.as_str()) {
            return Err(Diagnostic::new(
                ErrorKind::Parse,
                file,
                line,
                format!("invalid annotation scope '{}'", scope),
            ));
        }
    }

    Ok(annotations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_entrypoint_and_title() {
        let a = parse_block(
            "p.rego",
            3,
            &lines(&[" title: Allow rule", " entrypoint: true"]),
        )
        .unwrap();
        assert!(a.entrypoint);
        assert_eq!(a.title.as_deref(), Some("Allow rule"));
    }

    #[test]
    fn empty_block_is_default() {
        let a = parse_block("p.rego", 1, &[]).unwrap();
        assert!(!a.entrypoint);
        assert_eq!(a, Annotations::default());
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = parse_block("p.rego", 7, &lines(&[" entrypoint: [unclosed"])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert_eq!(err.line, 7);
        assert!(err.message.starts_with("yaml:"));
    }

    #[test]
    fn unknown_scope_rejected() {
        let err = parse_block("p.rego", 1, &lines(&[" scope: everything"])).unwrap_err();
        assert!(err.message.contains("invalid annotation scope"));
    }

    #[test]
    fn marker_detection_ignores_padding() {
        assert!(is_metadata_marker(" METADATA"));
        assert!(is_metadata_marker("METADATA  "));
        assert!(!is_metadata_marker(" metadata for humans"));
    }
}
