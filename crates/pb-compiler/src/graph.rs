// graph.rs — Rule index and dependency graph.
//
// Rules are identified by their document path, `data.<package>.<name>`.
// All definitions of a rule (incremental definitions, defaults) share one
// id. References and calls are resolved to ids here; the checker, the
// recursion check and reachability all work on the resulting edges.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{Module, Rule, RuleKind};
use crate::error::{Diagnostic, ErrorKind};

/// Location of one rule definition: (module index, rule index).
pub type DefinitionRef = (usize, usize);

#[derive(Debug, Clone)]
pub struct RuleEntry {
    /// Id path without the `data` root, e.g. `["authz", "allow"]`.
    pub path: Vec<String>,
    pub definitions: Vec<DefinitionRef>,
}

/// All rules of a compilation, keyed by id.
#[derive(Debug)]
pub struct RuleIndex<'m> {
    modules: &'m [Module],
    entries: BTreeMap<String, RuleEntry>,
}

pub fn rule_id(package: &[String], name: &str) -> String {
    let mut id = String::from("data");
    for segment in package.iter().map(String::as_str).chain(std::iter::once(name)) {
        id.push('.');
        id.push_str(segment);
    }
    id
}

impl<'m> RuleIndex<'m> {
    pub fn build(modules: &'m [Module]) -> Self {
        let mut entries: BTreeMap<String, RuleEntry> = BTreeMap::new();
        for (m, module) in modules.iter().enumerate() {
            for (r, rule) in module.rules.iter().enumerate() {
                let id = rule_id(&module.package, &rule.name);
                entries
                    .entry(id)
                    .or_insert_with(|| {
                        let mut path = module.package.clone();
                        path.push(rule.name.clone());
                        RuleEntry {
                            path,
                            definitions: Vec::new(),
                        }
                    })
                    .definitions
                    .push((m, r));
            }
        }
        Self { modules, entries }
    }

    pub fn modules(&self) -> &'m [Module] {
        self.modules
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn entry(&self, id: &str) -> Option<&RuleEntry> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &RuleEntry)> {
        self.entries.iter()
    }

    pub fn definitions(&self, id: &str) -> impl Iterator<Item = (&'m Module, &'m Rule)> + '_ {
        let modules = self.modules;
        self.entries
            .get(id)
            .into_iter()
            .flat_map(|e| e.definitions.iter())
            .map(move |&(m, r)| (&modules[m], &modules[m].rules[r]))
    }

    /// Kind of the first definition of a rule.
    pub fn kind(&self, id: &str) -> Option<RuleKind> {
        self.definitions(id).next().map(|(_, rule)| rule.kind)
    }

    /// Rules addressed by a path below `data`.
    ///
    /// A path may name a rule exactly, select inside a rule's value
    /// (`data.p.obj.field`), or name a package prefix, which covers every
    /// rule below it.
    pub fn resolve_path(&self, path: &[String]) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, e)| path.starts_with(&e.path) || e.path.starts_with(path))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Resolve a reference made inside `module`.
    pub fn resolve_ref(&self, module: &Module, segments: &[String]) -> Vec<String> {
        match self.absolute_path(module, segments) {
            Some(path) if !path.is_empty() => self.resolve_path(&path),
            _ => Vec::new(),
        }
    }

    /// Resolve a call to a user-defined function. Only an exact rule match
    /// counts; selecting into a rule is not a call.
    pub fn resolve_call(&self, module: &Module, name: &str) -> Option<String> {
        let segments: Vec<String> = name.split('.').map(str::to_string).collect();
        let path = self.absolute_path(module, &segments)?;
        self.entries
            .iter()
            .find(|(_, e)| e.path == path)
            .map(|(id, _)| id.clone())
    }

    /// Turn a module-relative reference into a path below `data`.
    fn absolute_path(&self, module: &Module, segments: &[String]) -> Option<Vec<String>> {
        let head = segments.first()?;
        if head == "data" {
            return Some(segments[1..].to_vec());
        }
        if let Some(import) = module.import_named(head) {
            if import.path.first().map(String::as_str) != Some("data") {
                return None;
            }
            let mut path = import.path[1..].to_vec();
            path.extend_from_slice(&segments[1..]);
            return Some(path);
        }
        let local = rule_id(&module.package, head);
        if self.entries.contains_key(&local) {
            let mut path = module.package.clone();
            path.extend_from_slice(segments);
            return Some(path);
        }
        None
    }

    /// Outgoing edges of every rule: the rules it references or calls.
    pub fn dependencies(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (id, entry) in &self.entries {
            let deps = edges.entry(id.clone()).or_default();
            for &(m, r) in &entry.definitions {
                let module = &self.modules[m];
                let rule = &module.rules[r];
                for reference in &rule.refs {
                    deps.extend(self.resolve_ref(module, &reference.segments));
                }
                for call in &rule.calls {
                    deps.extend(self.resolve_call(module, &call.name));
                }
            }
        }
        edges
    }

    /// Every rule reachable from `roots`, roots included.
    pub fn reachable(&self, roots: &[String]) -> BTreeSet<String> {
        let edges = self.dependencies();
        let mut seen = BTreeSet::new();
        let mut stack: Vec<String> = roots.to_vec();
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(next) = edges.get(&id) {
                stack.extend(next.iter().filter(|n| !seen.contains(*n)).cloned());
            }
        }
        seen
    }

    /// Report every dependency cycle once, at its lexically first rule.
    pub fn recursion_errors(&self) -> Vec<Diagnostic> {
        let edges = self.dependencies();
        let mut state: BTreeMap<&str, Visit> = BTreeMap::new();
        let mut cycles: Vec<Vec<String>> = Vec::new();

        for id in edges.keys() {
            let mut path = Vec::new();
            visit(id, &edges, &mut state, &mut path, &mut cycles);
        }

        cycles
            .into_iter()
            .map(|cycle| {
                let first = &cycle[0];
                let (file, line) = self
                    .definitions(first)
                    .next()
                    .map(|(m, r)| (m.file.clone(), r.line))
                    .unwrap_or_default();
                Diagnostic::new(
                    ErrorKind::Recursion,
                    file,
                    line,
                    format!("rule {} is recursive: {}", first, cycle.join(" -> ")),
                )
            })
            .collect()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    Active,
    Done,
}

fn visit<'a>(
    id: &'a str,
    edges: &'a BTreeMap<String, BTreeSet<String>>,
    state: &mut BTreeMap<&'a str, Visit>,
    path: &mut Vec<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    match state.get(id) {
        Some(Visit::Done) => return,
        Some(Visit::Active) => {
            if let Some(start) = path.iter().position(|p| *p == id) {
                let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(id.to_string());
                cycles.push(cycle);
            }
            return;
        }
        None => {}
    }

    state.insert(id, Visit::Active);
    path.push(id);
    if let Some(next) = edges.get(id) {
        for n in next {
            visit(n, edges, state, path, cycles);
        }
    }
    path.pop();
    state.insert(id, Visit::Done);
}
