// error.rs — Compiler diagnostics.
//
// Every failure the compiler reports is a Diagnostic tied to a file and
// line. A failed compilation returns all diagnostics collected so far as
// one `Diagnostics` error whose Display matches the familiar
// "N errors occurred:" layout.

use std::fmt;

/// Diagnostic category, rendered as the `rego_*_error` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorKind {
    Parse,
    Type,
    Compile,
    Recursion,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Parse => "rego_parse_error",
            ErrorKind::Type => "rego_type_error",
            ErrorKind::Compile => "rego_compile_error",
            ErrorKind::Recursion => "rego_recursion_error",
        };
        f.write_str(s)
    }
}

/// One compiler finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    /// Logical path of the module, empty for errors not tied to a file.
    pub file: String,
    /// 1-based line, 0 when unknown.
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        kind: ErrorKind,
        file: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// A diagnostic with no source location (e.g. a bad entrypoint name).
    pub fn global(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, "", 0, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            write!(f, "{}: {}", self.kind, self.message)
        } else {
            write!(f, "{}:{}: {}: {}", self.file, self.line, self.kind, self.message)
        }
    }
}

/// A failed compilation: one or more diagnostics, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics(pub Vec<Diagnostic>);

impl Diagnostics {
    pub fn single(diagnostic: Diagnostic) -> Self {
        Self(vec![diagnostic])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(d: Diagnostic) -> Self {
        Self::single(d)
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "compilation failed"),
            [only] => write!(f, "1 error occurred: {}", only),
            many => {
                write!(f, "{} errors occurred:", many.len())?;
                for d in many {
                    write!(f, "\n{}", d)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Diagnostics {}
