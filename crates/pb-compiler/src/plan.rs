// plan.rs — Plan intermediate representation.
//
// The plan lists the entrypoints of a compilation, every rule reachable
// from them with its direct dependencies, and the static table of
// builtins those rules call. Every collection is sorted so the JSON form
// is byte-stable for identical inputs.

use std::collections::{BTreeMap, BTreeSet};

use pb_capabilities::{CapabilitySet, FunctionDecl, WasmAbiVersion};
use serde::Serialize;

use crate::ast::RuleKind;
use crate::entrypoint::Entrypoint;
use crate::graph::RuleIndex;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub entrypoints: Vec<Entrypoint>,
    pub rules: Vec<PlanRule>,
    pub builtins: Vec<PlanBuiltin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wasm_abi: Option<WasmAbiVersion>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanRule {
    pub id: String,
    #[serde(flatten)]
    pub kind: RuleKind,
    pub file: String,
    pub line: usize,
    pub has_default: bool,
    pub definitions: usize,
    /// Ids of rules this rule depends on.
    pub depends_on: Vec<String>,
    /// Builtins called directly by this rule.
    pub calls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanBuiltin {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decl: Option<FunctionDecl>,
}

impl Plan {
    /// Build the plan for `entrypoints`. `reachable` is the closure of
    /// their rules over the dependency graph.
    pub fn build(
        index: &RuleIndex<'_>,
        caps: &CapabilitySet,
        entrypoints: Vec<Entrypoint>,
        reachable: &BTreeSet<String>,
    ) -> Self {
        let edges = index.dependencies();
        let mut used_builtins: BTreeMap<String, Option<FunctionDecl>> = BTreeMap::new();
        let mut rules = Vec::new();

        for id in reachable {
            let defs: Vec<_> = index.definitions(id).collect();
            let Some((first_module, first_rule)) = defs.first().copied() else {
                continue;
            };

            let mut calls = BTreeSet::new();
            for (module, rule) in &defs {
                for call in &rule.calls {
                    if index.resolve_call(module, &call.name).is_some() {
                        continue;
                    }
                    if let Some(builtin) = caps.builtin(&call.name) {
                        calls.insert(call.name.clone());
                        used_builtins
                            .entry(call.name.clone())
                            .or_insert_with(|| builtin.decl.clone());
                    }
                }
            }

            rules.push(PlanRule {
                id: id.clone(),
                kind: first_rule.kind,
                file: first_module.file.clone(),
                line: first_rule.line,
                has_default: defs.iter().any(|(_, r)| r.is_default),
                definitions: defs.len(),
                depends_on: edges
                    .get(id)
                    .map(|d| d.iter().cloned().collect())
                    .unwrap_or_default(),
                calls: calls.into_iter().collect(),
            });
        }

        let builtins = used_builtins
            .into_iter()
            .map(|(name, decl)| PlanBuiltin { name, decl })
            .collect();

        Plan {
            entrypoints,
            rules,
            builtins,
            wasm_abi: None,
        }
    }

    /// Files that define at least one planned rule.
    pub fn files(&self) -> BTreeSet<&str> {
        self.rules.iter().map(|r| r.file.as_str()).collect()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Module;
    use crate::entrypoint;
    use crate::parser::parse_module;
    use pb_capabilities::for_version;

    fn plan_for(sources: &[(&str, &str)], eps: &[&str]) -> Plan {
        let modules: Vec<Module> = sources
            .iter()
            .map(|(f, s)| parse_module(f, s).unwrap())
            .collect();
        let index = RuleIndex::build(&modules);
        let requested: Vec<String> = eps.iter().map(|s| s.to_string()).collect();
        let eps = entrypoint::resolve(&index, &requested).unwrap();
        let roots: Vec<String> = eps.iter().flat_map(|e| e.rules.clone()).collect();
        let reachable = index.reachable(&roots);
        let caps = for_version("v0.59.0").unwrap();
        Plan::build(&index, &caps, eps, &reachable)
    }

    #[test]
    fn plan_contains_reachable_rules_only() {
        let plan = plan_for(
            &[
                ("main.rego", "package main\n\nallow { count(data.lib.admins) > 0; lower(\"X\") == \"x\" }\n"),
                ("lib.rego", "package lib\n\nadmins := [\"root\"]\n"),
                ("other.rego", "package other\n\nunused := sprintf(\"%v\", [1])\n"),
            ],
            &["main/allow"],
        );
        let ids: Vec<&str> = plan.rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["data.lib.admins", "data.main.allow"]);
        assert_eq!(plan.rules[1].depends_on, vec!["data.lib.admins"]);
        assert_eq!(plan.rules[1].calls, vec!["count", "lower"]);

        let builtins: Vec<&str> = plan.builtins.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(builtins, vec!["count", "lower"]);
        assert_eq!(plan.files(), BTreeSet::from(["lib.rego", "main.rego"]));
    }

    #[test]
    fn json_is_stable() {
        let sources = [("p.rego", "package p\n\ndefault allow := false\nallow { input.ok }\n")];
        let a = plan_for(&sources, &[]).to_json().unwrap();
        let b = plan_for(&sources, &[]).to_json().unwrap();
        assert_eq!(a, b);

        let value: serde_json::Value = serde_json::from_slice(&a).unwrap();
        assert_eq!(value["rules"][0]["id"], "data.p.allow");
        assert_eq!(value["rules"][0]["kind"], "complete");
        assert_eq!(value["rules"][0]["has_default"], true);
        assert_eq!(value["rules"][0]["definitions"], 2);
        assert_eq!(value["entrypoints"][0]["name"], "p/allow");
    }
}
