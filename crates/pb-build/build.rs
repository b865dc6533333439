// build.rs — Embed toolchain and commit metadata into the library.
//
// Sets these env vars at compile time (each only when it can be determined):
//   PB_GIT_HASH: short git commit hash (e.g., "abc1234"), "-dirty" when modified
//   PB_RUSTC_VERSION: output of `rustc --version`
//   PB_TARGET: target triple being compiled for

use std::process::Command;

fn main() {
    if let Some(hash) = git_hash() {
        println!("cargo:rustc-env=PB_GIT_HASH={}", hash);
    }

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    if let Some(version) = command_output(&rustc, &["--version"]) {
        println!("cargo:rustc-env=PB_RUSTC_VERSION={}", version);
    }

    if let Ok(target) = std::env::var("TARGET") {
        println!("cargo:rustc-env=PB_TARGET={}", target);
    }

    // Re-run if git HEAD changes (new commits).
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/refs/");
}

fn git_hash() -> Option<String> {
    let hash = command_output("git", &["rev-parse", "--short", "HEAD"])?;
    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| !o.stdout.is_empty())
        .unwrap_or(false);

    Some(if dirty { format!("{}-dirty", hash) } else { hash })
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
}
