// check.rs — Capability and consistency checks.
//
// Runs after every module parsed. Everything a policy uses must be
// granted by the capability set: imported future keywords, the rego.v1
// import, every builtin it calls and every host a network builtin
// reaches. Rule definitions must also agree with each other.

use std::collections::BTreeSet;

use pb_capabilities::CapabilitySet;

use crate::ast::{Module, RuleKind};
use crate::error::{Diagnostic, ErrorKind};
use crate::graph::RuleIndex;

/// Builtins whose literal host argument is checked against `allow_net`.
pub const NETWORK_BUILTINS: &[&str] = &["http.send", "net.lookup_ip_addr"];

const REGO_V1_FEATURE: &str = "rego_v1_import";

/// Run every check and return all findings, in module order.
pub fn check(index: &RuleIndex<'_>, caps: &CapabilitySet) -> Vec<Diagnostic> {
    let mut errors = Vec::new();
    for module in index.modules() {
        check_imports(module, caps, &mut errors);
        check_calls(module, index, caps, &mut errors);
    }
    check_definitions(index, &mut errors);
    errors
}

fn check_imports(module: &Module, caps: &CapabilitySet, errors: &mut Vec<Diagnostic>) {
    for import in &module.imports {
        match import.path.first().map(String::as_str) {
            Some("future") => {
                if let Some(keyword) = import.path.get(2) {
                    if !caps.allows_future_keyword(keyword) {
                        errors.push(Diagnostic::new(
                            ErrorKind::Parse,
                            &module.file,
                            import.line,
                            format!(
                                "unexpected keyword {}, must be one of [{}]",
                                keyword,
                                caps.future_keywords.join(" ")
                            ),
                        ));
                    }
                }
            }
            Some("rego") if !caps.has_feature(REGO_V1_FEATURE) => {
                errors.push(Diagnostic::new(
                    ErrorKind::Parse,
                    &module.file,
                    import.line,
                    format!(
                        "invalid import rego.v1: capabilities do not enable feature {}",
                        REGO_V1_FEATURE
                    ),
                ));
            }
            _ => {}
        }
    }
}

fn check_calls(module: &Module, index: &RuleIndex<'_>, caps: &CapabilitySet, errors: &mut Vec<Diagnostic>) {
    for rule in &module.rules {
        for call in &rule.calls {
            let error = |kind: ErrorKind, message: String| {
                Diagnostic::new(kind, &module.file, call.line, message)
            };

            if let Some(id) = index.resolve_call(module, &call.name) {
                if let Some(RuleKind::Function { arity }) = index.kind(&id) {
                    if call.arg_count != arity && call.arg_count != arity + 1 {
                        errors.push(error(
                            ErrorKind::Type,
                            format!(
                                "{}: arity mismatch: have {} argument(s), want {}",
                                call.name, call.arg_count, arity
                            ),
                        ));
                    }
                }
                continue;
            }

            let Some(builtin) = caps.builtin(&call.name) else {
                errors.push(error(ErrorKind::Type, format!("undefined function {}", call.name)));
                continue;
            };

            if !builtin.accepts_arity(call.arg_count) {
                let want = builtin.decl.as_ref().map_or(0, |d| d.args.len());
                errors.push(error(
                    ErrorKind::Type,
                    format!(
                        "{}: arity mismatch: have {} argument(s), want {}",
                        call.name, call.arg_count, want
                    ),
                ));
            }

            if NETWORK_BUILTINS.contains(&call.name.as_str()) {
                if let Some(host) = &call.host {
                    if !caps.allows_host(host) {
                        errors.push(error(
                            ErrorKind::Compile,
                            format!("{}: unallowed host: {}", call.name, host),
                        ));
                    }
                }
            }
        }
    }
}

fn check_definitions(index: &RuleIndex<'_>, errors: &mut Vec<Diagnostic>) {
    for (id, _) in index.entries() {
        let defs: Vec<_> = index.definitions(id).collect();
        let Some(&(first_module, first_rule)) = defs.first() else {
            continue;
        };

        // Ref heads under one name may each carry their own default.
        let mut defaults: BTreeSet<&[String]> = BTreeSet::new();
        for (m, r) in defs.iter().filter(|(_, r)| r.is_default) {
            if !defaults.insert(r.head_ref.as_slice()) {
                let path = std::iter::once(id.as_str())
                    .chain(r.head_ref.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(".");
                errors.push(Diagnostic::new(
                    ErrorKind::Type,
                    &m.file,
                    r.line,
                    format!("multiple default rules {} found", path),
                ));
                break;
            }
        }

        if let Some((m, r)) = defs
            .iter()
            .find(|(_, r)| !r.kind.compatible_with(&first_rule.kind))
        {
            errors.push(Diagnostic::new(
                ErrorKind::Type,
                &m.file,
                r.line,
                format!(
                    "conflicting rules {} found: {} rule at {}:{} and {} rule here",
                    id,
                    first_rule.kind.label(),
                    first_module.file,
                    first_rule.line,
                    r.kind.label()
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;
    use pb_capabilities::{for_version, BuiltinDecl};

    fn run(src: &str, caps: &CapabilitySet) -> Vec<Diagnostic> {
        let modules = vec![parse_module("p.rego", src).unwrap()];
        let index = RuleIndex::build(&modules);
        check(&index, caps)
    }

    fn default_caps() -> CapabilitySet {
        for_version("v0.59.0").unwrap()
    }

    #[test]
    fn clean_policy_passes() {
        let errors = run(
            "package p\nimport future.keywords.if\n\nallow if { count(input.roles) > 0; is_admin(input.user) }\nis_admin(u) if { u == \"root\" }\n",
            &default_caps(),
        );
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn undefined_function() {
        let errors = run("package p\n\nallow { frobnicate(input.x) }\n", &default_caps());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Type);
        assert_eq!(errors[0].message, "undefined function frobnicate");
        assert_eq!(errors[0].line, 3);
    }

    #[test]
    fn builtin_missing_from_capabilities() {
        let mut caps = default_caps();
        caps.builtins.retain(|b| b.name != "count");
        let errors = run("package p\n\nn := count([1, 2])\n", &caps);
        assert_eq!(errors[0].message, "undefined function count");
    }

    #[test]
    fn custom_builtin_from_capabilities() {
        let mut caps = default_caps();
        caps.builtins.push(BuiltinDecl {
            name: "custom.lookup".to_string(),
            decl: None,
            infix: None,
        });
        assert!(run("package p\n\nx := custom.lookup(\"a\", \"b\")\n", &caps).is_empty());
    }

    #[test]
    fn arity_mismatch() {
        let errors = run("package p\n\nn := count()\n", &default_caps());
        assert!(errors[0].message.starts_with("count: arity mismatch"));

        let errors = run("package p\n\nf(a) := a\nx := f(1, 2, 3)\n", &default_caps());
        assert!(errors[0].message.starts_with("f: arity mismatch"));
    }

    #[test]
    fn future_keyword_not_in_capabilities() {
        let mut caps = default_caps();
        caps.future_keywords = vec!["in".to_string()];
        let errors = run("package p\nimport future.keywords.if\n\nallow if { true }\n", &caps);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Parse);
        assert_eq!(errors[0].message, "unexpected keyword if, must be one of [in]");
    }

    #[test]
    fn rego_v1_requires_feature() {
        let old = for_version("v0.50.0").unwrap();
        let errors = run("package p\nimport rego.v1\n\nallow if { true }\n", &old);
        assert!(errors[0].message.contains("rego_v1_import"));
        assert!(run("package p\nimport rego.v1\n\nallow if { true }\n", &default_caps()).is_empty());
    }

    #[test]
    fn network_hosts_respect_allow_net() {
        let src = "package p\n\nr := http.send({\"method\": \"get\", \"url\": \"https://blocked.example.com/x\"})\n";
        let mut caps = default_caps();
        assert!(run(src, &caps).is_empty());

        caps.allow_net = Some(vec!["api.example.com".to_string()]);
        let errors = run(src, &caps);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "http.send: unallowed host: blocked.example.com");
    }

    #[test]
    fn conflicting_definitions() {
        let errors = run(
            "package p\n\ndefault allow := false\ndefault allow := true\nx := 1\nx[k] := 2 { k := \"a\" }\n",
            &default_caps(),
        );
        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        assert!(messages.contains(&"multiple default rules data.p.allow found"));
        assert!(messages.iter().any(|m| m.starts_with("conflicting rules data.p.x found")));
    }

    #[test]
    fn ref_head_defaults_are_per_path() {
        let src = "package p

default fruit.apple.color := \"red\"
default fruit.pear.color := \"green\"
";
        assert!(run(src, &default_caps()).is_empty());

        let src = "package p

default fruit.apple.color := \"red\"
default fruit.apple.color := \"green\"
";
        let errors = run(src, &default_caps());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "multiple default rules data.p.fruit.apple.color found");
    }

    #[test]
    fn ref_head_conflicts_with_complete_rule() {
        let errors = run(
            "package p

fruit := {}
fruit.apple.color := \"red\"
",
            &default_caps(),
        );
        assert!(errors[0].message.starts_with("conflicting rules data.p.fruit found"));
    }
}
