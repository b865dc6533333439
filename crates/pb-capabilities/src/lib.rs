//! # pb-capabilities
//!
//! Capability sets for the pbuild policy compiler.
//!
//! A [`CapabilitySet`] lists the builtins, features, network hosts, future
//! keywords and wasm ABI versions a build may use. Sets come from three
//! places: a JSON file, a named release in the embedded catalog, or the
//! process default (the newest release). The [`CapabilityResolver`] turns
//! the optional file and version of a build request into one effective set.
//!
//! ## Key invariants
//!
//! - **Fail fast**: a file or version that cannot be loaded is an error,
//!   never a silent fallback to the default.
//! - **Concatenating merge**: merging keeps every entry of both inputs in
//!   order, duplicates included.
//! - **Shared default**: the default set is parsed once and handed out as
//!   the same `Arc` to every caller.

pub mod capability;
pub mod catalog;
pub mod error;
pub mod resolver;

pub use capability::{BuiltinDecl, CapabilitySet, FunctionDecl, WasmAbiVersion};
pub use catalog::{current_version, default_capabilities, for_version, known_versions};
pub use error::{CapabilityError, CapabilitySource};
pub use resolver::CapabilityResolver;
