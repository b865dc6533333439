// build.rs — `pbuild build`: compile sources into a bundle file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use pb_build::{BuildConfig, BuildRequest, Source};

#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Directories, .rego files, data documents or .tar.gz bundles.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output target: rego (alias bundle), plan or wasm.
    #[arg(short, long)]
    pub target: Option<String>,

    /// Treat directories as bundle roots.
    #[arg(short, long)]
    pub bundle: bool,

    /// Entrypoint, e.g. `authz/allow`. Repeatable.
    #[arg(short, long = "entrypoint")]
    pub entrypoints: Vec<String>,

    /// Capabilities JSON file.
    #[arg(long)]
    pub capabilities: Option<PathBuf>,

    /// Release whose capabilities to use.
    #[arg(long)]
    pub capabilities_version: Option<String>,

    /// Glob pattern of files and directories to skip. Repeatable.
    #[arg(long)]
    pub ignore: Vec<String>,

    /// Leave modules no entrypoint reaches out of the bundle.
    #[arg(long)]
    pub prune_unused: bool,

    /// Revision recorded in the bundle manifest.
    #[arg(long)]
    pub revision: Option<String>,

    /// Print the build transcript to stderr.
    #[arg(long)]
    pub debug: bool,

    /// Output file.
    #[arg(short, long, default_value = "bundle.tar.gz")]
    pub output: PathBuf,
}

pub fn execute(args: &BuildArgs, config_path: &Path) -> anyhow::Result<()> {
    let config = BuildConfig::load_or_default(config_path)?;
    let request = request_for(args, &config);

    let outcome = pb_build::build(&request);
    if let Some(log) = &outcome.log {
        eprint!("{}", log);
    }

    let artifact = match outcome.into_result() {
        Ok(artifact) => artifact,
        Err(e) => anyhow::bail!("{}", e),
    };

    std::fs::write(&args.output, artifact.as_bytes())
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!(
        "Wrote {} ({} bytes, sha256 {})",
        args.output.display(),
        artifact.len(),
        artifact.digest()
    );
    Ok(())
}

/// Flags override the config file; list flags replace configured lists
/// when given.
fn request_for(args: &BuildArgs, config: &BuildConfig) -> BuildRequest {
    let sources = args.paths.iter().cloned().map(Source::Path).collect();
    let mut request = config.to_request(sources);

    if let Some(target) = &args.target {
        request.target = target.clone();
    }
    request.bundle_mode |= args.bundle;
    request.prune_unused |= args.prune_unused;
    request.debug |= args.debug;
    if !args.entrypoints.is_empty() {
        request.entrypoints = args.entrypoints.clone();
    }
    if !args.ignore.is_empty() {
        request.ignore = args.ignore.clone();
    }
    if args.capabilities.is_some() {
        request.capabilities_file = args.capabilities.clone();
    }
    if args.capabilities_version.is_some() {
        request.capabilities_version = args.capabilities_version.clone();
    }
    if args.revision.is_some() {
        request.revision = args.revision.clone();
    }
    request
}
