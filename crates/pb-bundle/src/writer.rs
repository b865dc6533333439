// writer.rs — Deterministic bundle archives.
//
// A bundle is a gzip-compressed tar stream. Identical entries always
// produce identical bytes:
// - entries are written in path order
// - tar headers carry mode 0644, mtime 0, uid/gid 0 and no user names
// - the gzip header carries mtime 0 and no file name

use std::collections::BTreeMap;
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};

use crate::data::DataTree;
use crate::error::BundleError;
use crate::manifest::{Manifest, MANIFEST_FILE};

pub const DATA_ENTRY: &str = "data.json";
pub const PLAN_ENTRY: &str = "plan.json";
pub const WASM_ENTRY: &str = "policy.wasm";

/// Collects bundle entries and writes the archive.
#[derive(Debug, Default)]
pub struct BundleWriter {
    entries: BTreeMap<String, Vec<u8>>,
}

impl BundleWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one entry. Paths are relative; a duplicate path replaces the
    /// earlier entry.
    pub fn write_entry(&mut self, path: &str, bytes: impl Into<Vec<u8>>) {
        let path = path.trim_start_matches('/').to_string();
        self.entries.insert(path, bytes.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Encode the archive.
    pub fn finish(self) -> Result<Vec<u8>, BundleError> {
        let encoder: GzEncoder<Vec<u8>> = GzBuilder::new()
            .mtime(0)
            .write(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.mode(tar::HeaderMode::Deterministic);

        for (path, bytes) in &self.entries {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(bytes.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);
            builder.append_data(&mut header, path, bytes.as_slice())?;
        }

        let mut encoder = builder.into_inner()?;
        encoder.flush()?;
        let bytes = encoder.finish()?;
        tracing::debug!(entries = self.entries.len(), bytes = bytes.len(), "bundle written");
        Ok(bytes)
    }
}

/// Everything that goes into a bundle.
#[derive(Debug)]
pub struct BundleContents<'a> {
    pub manifest: &'a Manifest,
    pub data: &'a DataTree,
    /// (path, source text) of every module to include.
    pub modules: Vec<(&'a str, &'a str)>,
    pub plan: Option<&'a [u8]>,
    pub wasm: Option<&'a [u8]>,
}

/// Write a complete bundle.
pub fn write_bundle(contents: &BundleContents<'_>) -> Result<Vec<u8>, BundleError> {
    let mut writer = BundleWriter::new();
    writer.write_entry(MANIFEST_FILE, serde_json::to_vec(contents.manifest)?);
    if !contents.data.is_empty() {
        writer.write_entry(DATA_ENTRY, serde_json::to_vec(contents.data.as_map())?);
    }
    for (path, text) in &contents.modules {
        writer.write_entry(path, text.as_bytes());
    }
    if let Some(plan) = contents.plan {
        writer.write_entry(PLAN_ENTRY, plan);
    }
    if let Some(wasm) = contents.wasm {
        writer.write_entry(WASM_ENTRY, wasm);
    }
    writer.finish()
}

/// Read back `(path, bytes)` pairs of an archive, in stored order.
pub fn read_entries(archive: &[u8]) -> Result<Vec<(String, Vec<u8>)>, BundleError> {
    use std::io::Read;

    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(archive));
    let mut out = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().into_owned();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        out.push((path, bytes));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> BundleWriter {
        let mut w = BundleWriter::new();
        w.write_entry("z.rego", "package z\n");
        w.write_entry("/a.rego", "package a\n");
        w.write_entry(".manifest", r#"{"revision":""}"#);
        w
    }

    #[test]
    fn entries_are_sorted_and_relative() {
        let bytes = sample().finish().unwrap();
        let entries = read_entries(&bytes).unwrap();
        let paths: Vec<&str> = entries.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec![".manifest", "a.rego", "z.rego"]);
        assert_eq!(entries[1].1, b"package a\n".to_vec());
    }

    #[test]
    fn output_is_deterministic() {
        let a = sample().finish().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let b = sample().finish().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn gzip_header_has_zero_mtime() {
        let bytes = sample().finish().unwrap();
        assert_eq!(&bytes[0..2], &[0x1f, 0x8b]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn write_bundle_includes_optional_entries() {
        let manifest = Manifest {
            revision: "r7".to_string(),
            ..Manifest::default()
        };
        let mut data = DataTree::new();
        data.mount(&[], json!({"k": 1}), "data.json").unwrap();
        let contents = BundleContents {
            manifest: &manifest,
            data: &data,
            modules: vec![("policy.rego", "package p\n")],
            plan: Some(b"{}"),
            wasm: None,
        };
        let entries = read_entries(&write_bundle(&contents).unwrap()).unwrap();
        let paths: Vec<&str> = entries.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec![".manifest", "data.json", "plan.json", "policy.rego"]);

        let manifest: serde_json::Value = serde_json::from_slice(&entries[0].1).unwrap();
        assert_eq!(manifest["revision"], "r7");
    }

    #[test]
    fn empty_data_is_omitted() {
        let manifest = Manifest::default();
        let data = DataTree::new();
        let contents = BundleContents {
            manifest: &manifest,
            data: &data,
            modules: vec![],
            plan: None,
            wasm: Some(b"\0asm"),
        };
        let entries = read_entries(&write_bundle(&contents).unwrap()).unwrap();
        let paths: Vec<&str> = entries.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec![".manifest", "policy.wasm"]);
    }
}
