// outcome.rs — Result of one build.

use crate::error::BuildError;

/// Bytes of a built bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Lowercase hex SHA-256 of the bundle.
    pub fn digest(&self) -> String {
        pb_bundle::hash_bytes(&self.bytes)
    }
}

/// Either an artifact or an error, plus the debug transcript if one was
/// requested. Never both an artifact and an error.
#[derive(Debug)]
pub struct BuildOutcome {
    pub result: Result<Artifact, BuildError>,
    pub log: Option<String>,
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&BuildError> {
        self.result.as_ref().err()
    }

    /// The error rendered as one message.
    pub fn error_message(&self) -> Option<String> {
        self.error().map(ToString::to_string)
    }

    /// Artifact length, 0 on failure.
    pub fn result_len(&self) -> usize {
        self.artifact().map_or(0, Artifact::len)
    }

    pub fn into_result(self) -> Result<Artifact, BuildError> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_has_no_error() {
        let outcome = BuildOutcome {
            result: Ok(Artifact::new(b"bundle".to_vec())),
            log: None,
        };
        assert!(outcome.is_success());
        assert_eq!(outcome.result_len(), 6);
        assert!(outcome.error_message().is_none());
        assert_eq!(outcome.artifact().unwrap().digest().len(), 64);
    }

    #[test]
    fn failure_has_no_artifact() {
        let outcome = BuildOutcome {
            result: Err(BuildError::InvalidRequest("no sources given".to_string())),
            log: Some("line\n".to_string()),
        };
        assert!(!outcome.is_success());
        assert_eq!(outcome.result_len(), 0);
        assert!(outcome.artifact().is_none());
        assert_eq!(
            outcome.error_message().as_deref(),
            Some("invalid request: no sources given")
        );
    }
}
