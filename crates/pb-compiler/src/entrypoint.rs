// entrypoint.rs — Entrypoint resolution.
//
// An entrypoint is a slash-separated document path below `data`, e.g.
// `authz/allow` or a whole package `authz`. The effective set is the
// requested list plus everything annotated `entrypoint: true`. When that
// set is empty every non-function rule becomes an entrypoint.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::ast::RuleKind;
use crate::error::{Diagnostic, ErrorKind};
use crate::graph::RuleIndex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entrypoint {
    /// Normalized path, e.g. `authz/allow`.
    pub name: String,
    /// Ids of the rules this entrypoint evaluates.
    pub rules: Vec<String>,
}

/// Strip surrounding whitespace, a leading `/` and a leading `data/`.
pub fn normalize(entrypoint: &str) -> String {
    let trimmed = entrypoint.trim().trim_start_matches('/');
    let trimmed = trimmed.strip_prefix("data/").unwrap_or(trimmed);
    trimmed.trim_end_matches('/').to_string()
}

/// Resolve the effective entrypoints of a compilation.
pub fn resolve(index: &RuleIndex<'_>, requested: &[String]) -> Result<Vec<Entrypoint>, Vec<Diagnostic>> {
    let mut names: Vec<String> = Vec::new();
    for name in requested.iter().map(|ep| normalize(ep)).chain(annotated(index)) {
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }

    if names.is_empty() {
        tracing::debug!("no entrypoints given, using every rule");
        return Ok(all_rules(index));
    }

    let mut errors = Vec::new();
    let mut entrypoints = Vec::new();
    for name in names {
        let path: Vec<String> = name.split('/').map(str::to_string).collect();
        let rules = index.resolve_path(&path);
        if rules.is_empty() || path.iter().any(String::is_empty) {
            errors.push(Diagnostic::global(
                ErrorKind::Compile,
                format!("undefined entrypoint {}", name),
            ));
        } else {
            entrypoints.push(Entrypoint { name, rules });
        }
    }

    if errors.is_empty() {
        Ok(entrypoints)
    } else {
        Err(errors)
    }
}

/// Entrypoints declared through METADATA, in module order.
fn annotated(index: &RuleIndex<'_>) -> Vec<String> {
    let mut names = Vec::new();
    for module in index.modules() {
        let package = module.package.join("/");
        if module
            .package_annotations
            .as_ref()
            .is_some_and(|a| a.entrypoint)
        {
            names.push(package.clone());
        }
        for rule in &module.rules {
            if rule.annotations.as_ref().is_some_and(|a| a.entrypoint) {
                names.push(format!("{}/{}", package, rule.name));
            }
        }
    }
    names
}

fn all_rules(index: &RuleIndex<'_>) -> Vec<Entrypoint> {
    let ids: BTreeSet<&String> = index
        .ids()
        .filter(|id| !matches!(index.kind(id), Some(RuleKind::Function { .. })))
        .collect();
    ids.into_iter()
        .filter_map(|id| {
            index.entry(id).map(|e| Entrypoint {
                name: e.path.join("/"),
                rules: vec![id.clone()],
            })
        })
        .collect()
}
