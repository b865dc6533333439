//! # pb-bundle
//!
//! Source loading and bundle archives for pbuild.
//!
//! [`loader::load`] turns the sources of a build (directories, bundle
//! archives, single files, inline text) into policy modules plus one
//! merged data tree. [`writer::write_bundle`] packs a compilation result
//! into a `.tar.gz` bundle.
//!
//! ## Key invariants
//!
//! - **Deterministic archives**: identical contents produce identical
//!   bytes, independent of input order, clock and file ownership.
//! - **No silent overwrites on load**: conflicting data keys and duplicate
//!   module paths are errors.

pub mod data;
pub mod error;
pub mod hasher;
pub mod ignore;
pub mod loader;
pub mod manifest;
pub mod writer;

pub use data::DataTree;
pub use error::BundleError;
pub use hasher::hash_bytes;
pub use ignore::IgnoreSet;
pub use loader::{load, LoadOptions, LoadedSources, SourceInput};
pub use manifest::{Manifest, WasmResolver, MANIFEST_FILE};
pub use writer::{read_entries, write_bundle, BundleContents, BundleWriter};
