//! # pb-compiler
//!
//! Rego front end for the pbuild pipeline.
//!
//! The compiler does not evaluate policies. It parses modules far enough
//! to know their packages, imports, rules, calls and references, then
//! enforces the build contract: every module parses, everything used is
//! granted by the capability set, rules are consistent and non-recursive,
//! and every entrypoint names a rule or package.
//!
//! ## Key invariants
//!
//! - **Capability gating**: builtins, future keywords, `rego.v1` and
//!   network hosts outside the [`pb_capabilities::CapabilitySet`] are
//!   compile errors.
//! - **All errors at once**: each stage reports every diagnostic it finds
//!   before the compilation stops.
//! - **Deterministic output**: plans and wasm modules are byte-identical
//!   for identical inputs.

pub mod annotations;
pub mod ast;
pub mod check;
pub mod compiler;
pub mod entrypoint;
pub mod error;
pub mod graph;
pub mod lexer;
pub mod parser;
pub mod plan;
pub mod target;
pub mod wasm;

pub use compiler::{CompileOptions, CompiledPolicy, Compiler, SourceModule};
pub use entrypoint::Entrypoint;
pub use error::{Diagnostic, Diagnostics, ErrorKind};
pub use plan::Plan;
pub use target::{Target, UnknownTarget};
