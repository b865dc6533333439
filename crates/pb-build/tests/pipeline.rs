// pipeline.rs — End-to-end builds over files on disk.

use std::path::Path;
use std::sync::Arc;

use pb_build::{build, BuildRequest, CapabilityResolver, CompilationPipeline, Source};
use pb_bundle::read_entries;
use serde_json::{json, Value};
use tempfile::tempdir;

const AUTHZ: &str = r#"package authz

import rego.v1

default allow := false

allow if {
    input.user.role == "admin"
}

allow if {
    some grant in data.authz.grants
    grant.user == input.user.name
}
"#;

const UNUSED: &str = "package scratch\n\nnote := \"not deployed\"\n";

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn policy_tree() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    write(dir.path(), "authz/policy.rego", AUTHZ);
    write(dir.path(), "authz/data.json", r#"{"grants": [{"user": "bob"}]}"#);
    write(dir.path(), "scratch/notes.rego", UNUSED);
    dir
}

fn entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    read_entries(bytes).unwrap()
}

fn paths(bytes: &[u8]) -> Vec<String> {
    entries(bytes).into_iter().map(|(p, _)| p).collect()
}

fn entry_json(bytes: &[u8], name: &str) -> Value {
    let (_, content) = entries(bytes).into_iter().find(|(p, _)| p == name).unwrap();
    serde_json::from_slice(&content).unwrap()
}

#[test]
fn builds_bundle_from_directory() {
    let dir = policy_tree();
    let outcome = build(&BuildRequest::new(dir.path(), "bundle").bundle_mode(true));

    assert!(outcome.is_success(), "{:?}", outcome.error_message());
    assert!(outcome.result_len() > 0);
    assert!(outcome.error().is_none());
    assert!(outcome.log.is_none());

    let bytes = outcome.artifact().unwrap().as_bytes();
    assert_eq!(
        paths(bytes),
        vec![".manifest", "authz/policy.rego", "data.json", "scratch/notes.rego"]
    );
    assert_eq!(
        entry_json(bytes, "data.json"),
        json!({"authz": {"grants": [{"user": "bob"}]}})
    );
}

#[test]
fn unknown_capabilities_version_fails() {
    let dir = policy_tree();
    let outcome = build(
        &BuildRequest::new(dir.path(), "rego")
            .bundle_mode(true)
            .capabilities_version("nonexistent-version-xyz"),
    );

    let message = outcome.error_message().unwrap();
    assert!(message.contains("not found"), "{}", message);
    assert!(message.contains("nonexistent-version-xyz"));
    assert_eq!(outcome.result_len(), 0);
    assert!(outcome.artifact().is_none());
}

#[test]
fn missing_capabilities_file_fails() {
    let dir = policy_tree();
    let outcome = build(
        &BuildRequest::new(dir.path(), "rego").capabilities_file(dir.path().join("nope.json")),
    );
    assert_eq!(outcome.error().unwrap().kind(), "capability_load");
    assert!(outcome.error_message().unwrap().contains("from file"));
}

#[test]
fn identical_requests_produce_identical_bytes() {
    let dir = policy_tree();
    let request = BuildRequest::new(dir.path(), "rego").bundle_mode(true);
    let first = build(&request).into_result().unwrap();
    let second = build(&request).into_result().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.digest(), second.digest());
}

#[test]
fn blank_entrypoints_are_ignored() {
    let dir = policy_tree();
    let outcome = build(
        &BuildRequest::new(dir.path(), "plan")
            .bundle_mode(true)
            .entrypoints(["", "   ", "authz/allow"]),
    );
    assert!(outcome.is_success(), "{:?}", outcome.error_message());

    let plan = entry_json(outcome.artifact().unwrap().as_bytes(), "plan.json");
    let names: Vec<&str> = plan["entrypoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["authz/allow"]);
}

#[test]
fn undefined_entrypoint_fails() {
    let dir = policy_tree();
    let outcome = build(
        &BuildRequest::new(dir.path(), "rego")
            .bundle_mode(true)
            .entrypoints(["authz/missing"]),
    );
    assert!(outcome
        .error_message()
        .unwrap()
        .contains("undefined entrypoint authz/missing"));
}

#[test]
fn debug_log_is_present_only_when_requested() {
    let dir = policy_tree();
    let quiet = build(&BuildRequest::new(dir.path(), "rego"));
    assert!(quiet.log.is_none());

    let verbose = build(&BuildRequest::new(dir.path(), "rego").debug(true));
    let log = verbose.log.unwrap();
    assert!(log.contains("Compiler version:"));
    assert!(log.contains("bundle written"));
}

#[test]
fn failed_debug_build_keeps_log_and_no_artifact() {
    let outcome = build(&BuildRequest::from_text("bad rego", "rego").debug(true));

    let message = outcome.error_message().unwrap();
    assert!(message.contains("rego_parse_error: package expected"), "{}", message);
    assert!(outcome.artifact().is_none());
    assert_eq!(outcome.result_len(), 0);

    let log = outcome.log.unwrap();
    assert!(log.contains("Compiler version:"));
    assert!(log.contains("[ERROR] build failed:"));
}

#[test]
fn file_capabilities_merge_with_version() {
    let dir = policy_tree();
    // v0.53.1 predates `import rego.v1`; the file grants the feature.
    let denied = build(
        &BuildRequest::new(dir.path(), "rego")
            .bundle_mode(true)
            .capabilities_version("v0.53.1"),
    );
    assert!(denied.error_message().unwrap().contains("rego.v1"));

    let caps = dir.path().join("caps.json");
    std::fs::write(&caps, r#"{"builtins": [], "features": ["rego_v1_import"]}"#).unwrap();
    let granted = build(
        &BuildRequest::new(dir.path(), "rego")
            .bundle_mode(true)
            .ignore(["caps.json"])
            .capabilities_file(&caps)
            .capabilities_version("v0.53.1"),
    );
    assert!(granted.is_success(), "{:?}", granted.error_message());
}

#[test]
fn file_only_capabilities_restrict_builtins() {
    let dir = tempdir().unwrap();
    write(dir.path(), "p.rego", "package p\n\nn := count(input.items)\n");
    let caps = dir.path().join("caps.json");
    std::fs::write(&caps, r#"{"builtins": [{"name": "sum"}]}"#).unwrap();

    let outcome = build(&BuildRequest::new(dir.path().join("p.rego"), "rego").capabilities_file(&caps));
    let message = outcome.error_message().unwrap();
    assert!(message.contains("rego_type_error: undefined function count"), "{}", message);
}

#[test]
fn prune_unused_drops_unreachable_modules() {
    let dir = policy_tree();
    let outcome = build(
        &BuildRequest::new(dir.path(), "rego")
            .bundle_mode(true)
            .entrypoints(["authz/allow"])
            .prune_unused(true),
    );
    let bytes = outcome.into_result().unwrap().into_bytes();
    let names = paths(&bytes);
    assert!(names.contains(&"authz/policy.rego".to_string()));
    assert!(!names.contains(&"scratch/notes.rego".to_string()));
}

#[test]
fn wasm_target_writes_module_and_resolvers() {
    let dir = policy_tree();
    let outcome = build(
        &BuildRequest::new(dir.path(), "wasm")
            .bundle_mode(true)
            .entrypoints(["authz/allow"]),
    );
    let bytes = outcome.into_result().unwrap().into_bytes();

    let (_, module) = entries(&bytes)
        .into_iter()
        .find(|(p, _)| p == "policy.wasm")
        .unwrap();
    assert_eq!(&module[0..4], b"\0asm");
    assert!(!paths(&bytes).contains(&"plan.json".to_string()));

    let manifest = entry_json(&bytes, ".manifest");
    assert_eq!(
        manifest["wasm"],
        json!([{"entrypoint": "authz/allow", "module": "/policy.wasm"}])
    );
}

#[test]
fn revision_comes_from_request_or_source_manifest() {
    let dir = policy_tree();
    write(dir.path(), ".manifest", r#"{"revision": "from-source", "roots": ["authz", "scratch"]}"#);

    let bytes = build(&BuildRequest::new(dir.path(), "rego").bundle_mode(true))
        .into_result()
        .unwrap()
        .into_bytes();
    let manifest = entry_json(&bytes, ".manifest");
    assert_eq!(manifest["revision"], "from-source");
    assert_eq!(manifest["roots"], json!(["authz", "scratch"]));

    let bytes = build(
        &BuildRequest::new(dir.path(), "rego")
            .bundle_mode(true)
            .revision("override"),
    )
    .into_result()
    .unwrap()
    .into_bytes();
    assert_eq!(entry_json(&bytes, ".manifest")["revision"], "override");
}

#[test]
fn sources_combine_paths_and_inline_text() {
    let dir = policy_tree();
    let request = BuildRequest::new(dir.path().join("authz/policy.rego"), "rego").add_source(
        Source::Inline {
            path: "extra/ok.rego".to_string(),
            text: "package extra\n\nok := true\n".to_string(),
        },
    );
    let bytes = build(&request).into_result().unwrap().into_bytes();
    assert_eq!(paths(&bytes), vec![".manifest", "extra/ok.rego", "policy.rego"]);
}

#[test]
fn two_roots_with_same_file_names_build() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a/policy.rego", "package a\n\nallow := true\n");
    write(dir.path(), "b/policy.rego", "package b\n\nallow := data.a.allow\n");
    let request = BuildRequest::with_sources(
        vec![
            Source::Path(dir.path().join("a")),
            Source::Path(dir.path().join("b")),
        ],
        "rego",
    )
    .entrypoints(["b/allow"]);

    let outcome = build(&request);
    assert!(outcome.is_success(), "{:?}", outcome.error_message());
    let bytes = outcome.into_result().unwrap().into_bytes();
    assert_eq!(
        paths(&bytes),
        vec![".manifest", "a/policy.rego", "b/policy.rego"]
    );
}

#[test]
fn missing_source_path_is_io_error() {
    let dir = tempdir().unwrap();
    let outcome = build(&BuildRequest::new(dir.path().join("absent"), "rego"));
    assert_eq!(outcome.error().unwrap().kind(), "io");
}

#[test]
fn conflicting_data_is_a_merge_error() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a/data.json", r#"{"x": 1}"#);
    write(dir.path(), "data.json", r#"{"a": {"x": 2}}"#);
    write(dir.path(), "p.rego", "package p\n\ny := 1\n");
    let outcome = build(&BuildRequest::new(dir.path(), "rego").bundle_mode(true));
    assert_eq!(
        outcome.error_message().as_deref(),
        Some("merge error: conflicting key a/x")
    );
}

#[test]
fn pipeline_uses_its_resolver_default() {
    let older = Arc::new(pb_capabilities::for_version("v0.53.1").unwrap());
    let pipeline = CompilationPipeline::new(CapabilityResolver::with_default(older));
    let outcome = pipeline.build(&BuildRequest::from_text(AUTHZ, "rego"));
    assert!(outcome.error_message().unwrap().contains("rego.v1"));
}

#[test]
fn concurrent_builds_are_independent() {
    let dir = policy_tree();
    let root = dir.path().to_path_buf();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let root = root.clone();
            std::thread::spawn(move || {
                let request = BuildRequest::new(root, "rego").bundle_mode(true).debug(i % 2 == 0);
                build(&request)
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (i, outcome) in outcomes.iter().enumerate() {
        assert!(outcome.is_success());
        assert_eq!(outcome.log.is_some(), i % 2 == 0);
    }
    let first = outcomes[0].artifact().unwrap();
    assert!(outcomes.iter().all(|o| o.artifact().unwrap() == first));
}
