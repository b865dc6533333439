// loader.rs — Source discovery.
//
// Turns the sources of a build request into policy modules, one merged
// data tree and, in bundle mode, the manifest found at the bundle root.
//
// Source kinds:
// - directory: walked recursively in name order, ignore patterns applied
// - `.tar.gz` / `.tgz` file: read as a bundle archive
// - `.rego` file: one module named after the file
// - `data.json` / `data.yaml` / `data.yml` file: data at the root
// - inline text: one module with a caller-chosen path
//
// Module paths are relative and `/`-separated. Modules come back sorted
// by path so the input order never changes the output. When more than one
// path source is given, modules from a directory or archive are placed
// under that root's name (`a/policy.rego`, `b/policy.rego`); a repeated
// name gets a `-N` suffix in input order. Data mounts are not namespaced.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use pb_compiler::SourceModule;
use walkdir::WalkDir;

use crate::data::{self, DataTree};
use crate::error::BundleError;
use crate::ignore::IgnoreSet;
use crate::manifest::{Manifest, MANIFEST_FILE};

/// One source of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    Path(PathBuf),
    Inline { path: String, text: String },
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Treat directories as bundle roots: data documents are mounted at
    /// their directory path and a root `.manifest` is honored.
    pub bundle_mode: bool,
    pub ignore: Vec<String>,
}

#[derive(Debug, Default)]
pub struct LoadedSources {
    pub modules: Vec<SourceModule>,
    pub data: DataTree,
    /// Manifest from a bundle root or archive, if one was present.
    pub manifest: Option<Manifest>,
}

/// Load every source.
pub fn load(inputs: &[SourceInput], options: &LoadOptions) -> Result<LoadedSources, BundleError> {
    let roots = inputs
        .iter()
        .filter(|i| matches!(i, SourceInput::Path(_)))
        .count();
    let mut loader = Loader {
        ignore: IgnoreSet::new(&options.ignore)?,
        bundle_mode: options.bundle_mode,
        multi_root: roots > 1,
        namespace: None,
        namespaces: BTreeSet::new(),
        modules: BTreeMap::new(),
        data: DataTree::new(),
        manifest: None,
    };

    for input in inputs {
        match input {
            SourceInput::Path(path) => loader.load_path(path)?,
            SourceInput::Inline { path, text } => {
                loader.add_module(normalize_entry_path(path), text.clone())?
            }
        }
    }

    tracing::debug!(
        modules = loader.modules.len(),
        has_data = !loader.data.is_empty(),
        has_manifest = loader.manifest.is_some(),
        "sources loaded"
    );

    Ok(LoadedSources {
        modules: loader
            .modules
            .into_iter()
            .map(|(path, text)| SourceModule { path, text })
            .collect(),
        data: loader.data,
        manifest: loader.manifest,
    })
}

struct Loader {
    ignore: IgnoreSet,
    bundle_mode: bool,
    multi_root: bool,
    /// Prefix for module paths of the root being loaded.
    namespace: Option<String>,
    namespaces: BTreeSet<String>,
    modules: BTreeMap<String, String>,
    data: DataTree,
    manifest: Option<Manifest>,
}

impl Loader {
    fn load_path(&mut self, path: &Path) -> Result<(), BundleError> {
        let metadata = std::fs::metadata(path).map_err(|source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if metadata.is_dir() {
            self.enter_namespace(path, "");
            let loaded = self.load_dir(path);
            self.namespace = None;
            return loaded;
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BundleError::Unsupported {
                path: path.to_path_buf(),
                reason: "file name is not valid UTF-8".to_string(),
            })?;

        if is_archive(name) {
            let suffix = if name.ends_with(".tgz") { ".tgz" } else { ".tar.gz" };
            self.enter_namespace(path, suffix);
            let loaded = self.load_archive(path);
            self.namespace = None;
            return loaded;
        }
        if !name.ends_with(".rego") && !data::is_data_file(name) {
            return Err(BundleError::Unsupported {
                path: path.to_path_buf(),
                reason: "expected a directory, a .rego file, a data document or a .tar.gz bundle"
                    .to_string(),
            });
        }

        let bytes = read_file(path)?;
        self.add_file(name, bytes, false, path)
    }

    fn load_dir(&mut self, root: &Path) -> Result<(), BundleError> {
        tracing::debug!(root = %root.display(), bundle = self.bundle_mode, "walking source directory");
        let ignore = &self.ignore;
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !ignore.is_ignored(&relative_path(root, e.path())));

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| map_walkdir_error(root, e))?;
            if entry.file_type().is_file() {
                files.push((relative_path(root, entry.path()), entry.into_path()));
            }
        }

        let bundle_layout = self.bundle_mode;
        for (relative, path) in files {
            let name = relative.rsplit('/').next().unwrap_or(&relative);
            if name.ends_with(".rego") || data::is_data_file(name) || relative == MANIFEST_FILE {
                let bytes = read_file(&path)?;
                self.add_file(&relative, bytes, bundle_layout, &path)?;
            } else {
                tracing::trace!(file = %relative, "skipping non-policy file");
            }
        }
        Ok(())
    }

    fn load_archive(&mut self, path: &Path) -> Result<(), BundleError> {
        tracing::debug!(archive = %path.display(), "reading bundle archive");
        let archive_error = |detail: String| BundleError::Archive {
            path: path.to_path_buf(),
            detail,
        };

        let file = File::open(path).map_err(|source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        let mut files = Vec::new();
        for entry in archive.entries().map_err(|e| archive_error(e.to_string()))? {
            let mut entry = entry.map_err(|e| archive_error(e.to_string()))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let entry_path = entry.path().map_err(|e| archive_error(e.to_string()))?;
            let relative = normalize_entry_path(&entry_path.to_string_lossy());
            if relative.is_empty() || self.ignore.is_ignored(&relative) {
                continue;
            }
            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| archive_error(e.to_string()))?;
            files.push((relative, bytes));
        }

        // Archives are always laid out as bundles.
        for (relative, bytes) in files {
            self.add_file(&relative, bytes, true, path)?;
        }
        Ok(())
    }

    /// Route one file by name. `bundle_layout` mounts data at the file's
    /// directory and accepts a root `.manifest`.
    fn add_file(&mut self, relative: &str, bytes: Vec<u8>, bundle_layout: bool, origin: &Path) -> Result<(), BundleError> {
        let (dir, name) = match relative.rsplit_once('/') {
            Some((dir, name)) => (dir, name),
            None => ("", relative),
        };

        if relative == MANIFEST_FILE {
            if bundle_layout {
                self.manifest = Some(Manifest::parse(relative, &bytes)?);
            }
            return Ok(());
        }

        if name.ends_with(".rego") {
            let text = String::from_utf8(bytes).map_err(|_| BundleError::Unsupported {
                path: origin.to_path_buf(),
                reason: "policy file is not valid UTF-8".to_string(),
            })?;
            let module_path = match &self.namespace {
                Some(ns) => format!("{}/{}", ns, relative),
                None => relative.to_string(),
            };
            return self.add_module(module_path, text);
        }

        if data::is_data_file(name) {
            let document = data::parse_document(relative, &bytes)?;
            let mount: Vec<String> = if bundle_layout {
                dir.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect()
            } else {
                Vec::new()
            };
            return self.data.mount(&mount, document, relative);
        }

        Ok(())
    }

    /// Claim a module namespace for `root` when several roots are loaded.
    fn enter_namespace(&mut self, root: &Path, suffix: &str) {
        if !self.multi_root {
            return;
        }
        let base = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .map(|n| n.strip_suffix(suffix).unwrap_or(&n).to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "source".to_string());
        let mut name = base.clone();
        let mut n = 2;
        while self.namespaces.contains(&name) {
            name = format!("{}-{}", base, n);
            n += 1;
        }
        tracing::debug!(root = %root.display(), namespace = %name, "module namespace");
        self.namespaces.insert(name.clone());
        self.namespace = Some(name);
    }

    fn add_module(&mut self, path: String, text: String) -> Result<(), BundleError> {
        if self.modules.contains_key(&path) {
            return Err(BundleError::DuplicateModule { path });
        }
        self.modules.insert(path, text);
        Ok(())
    }
}

fn is_archive(name: &str) -> bool {
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

fn read_file(path: &Path) -> Result<Vec<u8>, BundleError> {
    std::fs::read(path).map_err(|source| BundleError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `/`-joined path of `path` below `root`.
fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `./a/b.rego`, `/a/b.rego` → `a/b.rego`
pub(crate) fn normalize_entry_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn map_walkdir_error(root: &Path, err: walkdir::Error) -> BundleError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let detail = err.to_string();
    match err.into_io_error() {
        Some(source) => BundleError::Io { path, source },
        None => BundleError::Unsupported { path, reason: detail },
    }
}
