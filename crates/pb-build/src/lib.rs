//! # pb-build
//!
//! The pbuild policy build pipeline.
//!
//! A [`BuildRequest`] names the sources, the output target, the capability
//! sources and the entrypoints of one build. [`CompilationPipeline::build`]
//! resolves capabilities, loads and compiles the sources, and writes a
//! `.tar.gz` bundle, returning a [`BuildOutcome`] that holds either the
//! bundle bytes or one error, plus a debug transcript when requested.
//!
//! ```no_run
//! use pb_build::{build, BuildRequest};
//!
//! let outcome = build(&BuildRequest::new("policies", "rego").bundle_mode(true));
//! match outcome.into_result() {
//!     Ok(bundle) => std::fs::write("bundle.tar.gz", bundle.as_bytes()).unwrap(),
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```
//!
//! ## Key invariants
//!
//! - **Exclusive outcome**: a build yields an artifact or an error, never
//!   both and never a partial artifact.
//! - **Per-call state**: request, capabilities, log and outcome belong to
//!   one call. Only the default capabilities and [`VersionInfo`] are shared,
//!   and both are immutable.
//! - **Deterministic**: identical requests over identical files produce
//!   byte-identical bundles.

pub mod config;
pub mod error;
pub mod log;
pub mod outcome;
pub mod pipeline;
pub mod request;
pub mod version;

pub use config::{BuildConfig, CONFIG_FILE};
pub use error::{BuildError, ConfigError};
pub use log::{BufferedLog, BuildLog, LogLevel, NoopLog};
pub use outcome::{Artifact, BuildOutcome};
pub use pipeline::{build, CompilationPipeline};
pub use request::{BuildRequest, Source, INLINE_MODULE_PATH};
pub use version::VersionInfo;

pub use pb_capabilities::CapabilityResolver;
pub use pb_compiler::Target;
