// ast.rs — Parsed module structure.
//
// The compiler does not evaluate policies, so rule bodies are not kept as
// expression trees. Each rule records what the checker and the dependency
// graph need: its head shape, the functions it calls and the references
// it makes to other rules.

use serde::Serialize;

use crate::annotations::Annotations;

/// Future keywords that must be imported before use.
pub const FUTURE_KEYWORDS: &[&str] = &["contains", "every", "if", "in"];

/// One parsed `.rego` file.
#[derive(Debug, Clone)]
pub struct Module {
    /// Logical path of the file (as written into the bundle).
    pub file: String,
    /// Package path without the leading `data`, e.g. `["authz", "rbac"]`.
    pub package: Vec<String>,
    pub package_line: usize,
    pub package_annotations: Option<Annotations>,
    pub imports: Vec<Import>,
    pub rules: Vec<Rule>,
    /// Set by `import rego.v1`.
    pub rego_v1: bool,
    /// Future keywords activated by the imports.
    pub keywords: Vec<String>,
    /// Original text, written unchanged into bundles.
    pub source: String,
}

impl Module {
    /// Package path joined with `.`, e.g. `authz.rbac`.
    pub fn package_path(&self) -> String {
        self.package.join(".")
    }

    /// Whether a future keyword is usable in this module.
    pub fn keyword_enabled(&self, keyword: &str) -> bool {
        self.rego_v1 || self.keywords.iter().any(|k| k == keyword)
    }

    /// Import bound to `name` (alias or last path segment), if any.
    pub fn import_named(&self, name: &str) -> Option<&Import> {
        self.imports.iter().find(|i| i.name() == Some(name))
    }

    pub fn rules_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| r.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    /// Full path including the root, e.g. `["data", "lib", "util"]`.
    pub path: Vec<String>,
    pub alias: Option<String>,
    pub line: usize,
}

impl Import {
    /// The name this import binds in the module. `future` and `rego`
    /// imports bind nothing.
    pub fn name(&self) -> Option<&str> {
        match self.path.first().map(String::as_str) {
            Some("future") | Some("rego") => None,
            _ => self
                .alias
                .as_deref()
                .or_else(|| self.path.last().map(String::as_str)),
        }
    }

    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RuleKind {
    /// `p := v`, `p if { … }`
    Complete,
    /// `p contains x`, `p[x] { … }`
    PartialSet,
    /// `p[k] = v`
    PartialObject,
    /// `f(x) := v`
    Function { arity: usize },
}

impl RuleKind {
    pub fn label(&self) -> &'static str {
        match self {
            RuleKind::Complete => "complete",
            RuleKind::PartialSet => "partial set",
            RuleKind::PartialObject => "partial object",
            RuleKind::Function { .. } => "function",
        }
    }

    /// Kinds that define the same document and may coexist.
    pub fn compatible_with(&self, other: &RuleKind) -> bool {
        match (self, other) {
            (RuleKind::Function { arity: a }, RuleKind::Function { arity: b }) => a == b,
            (a, b) => a == b,
        }
    }
}

/// A function call inside a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    /// Dotted callee name as written, e.g. `http.send` or `lib.helper`.
    pub name: String,
    pub arg_count: usize,
    pub line: usize,
    /// Host of a literal URL or hostname passed as the first argument.
    pub host: Option<String>,
}

/// A reference that may name another rule, e.g. `data.lib.allowed` or `deny`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub segments: Vec<String>,
    pub line: usize,
}

/// One rule definition. `else` branches are folded into their rule.
///
/// A ref head such as `fruit.apple.color := "red"` is indexed under its
/// first segment (`fruit`) as a partial object; the remaining segments are
/// kept in `head_ref`.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub head_ref: Vec<String>,
    pub kind: RuleKind,
    pub is_default: bool,
    pub line: usize,
    pub annotations: Option<Annotations>,
    pub calls: Vec<CallSite>,
    pub refs: Vec<Reference>,
}
