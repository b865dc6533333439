// error.rs — Error types for source loading and bundle writing.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BundleError {
    /// A source path could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A source path is neither a directory, a policy file, a data
    /// document nor a bundle archive.
    #[error("unsupported source {path}: {reason}")]
    Unsupported { path: PathBuf, reason: String },

    /// An ignore pattern is not a valid glob.
    #[error("invalid ignore pattern '{pattern}': {detail}")]
    InvalidPattern { pattern: String, detail: String },

    /// A data document is not valid JSON or YAML.
    #[error("failed to parse data document {path}: {detail}")]
    DataParse { path: String, detail: String },

    /// Two data documents define the same key.
    #[error("merge error: conflicting key {key}")]
    MergeConflict { key: String },

    /// Two sources map to the same module path.
    #[error("merge error: duplicate module {path}")]
    DuplicateModule { path: String },

    /// A `.manifest` file is malformed.
    #[error("invalid manifest {path}: {detail}")]
    Manifest { path: String, detail: String },

    /// A bundle archive could not be decoded.
    #[error("failed to read bundle archive {path}: {detail}")]
    Archive { path: PathBuf, detail: String },

    /// Writing the output archive failed.
    #[error("failed to write bundle: {0}")]
    Write(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
