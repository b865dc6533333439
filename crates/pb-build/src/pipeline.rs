// pipeline.rs — The build pipeline.
//
// Steps, in order; the first failure ends the build:
// 1. Validate the request and parse its target.
// 2. Resolve the capability set.
// 3. Load sources (modules, data, source manifest).
// 4. Compile against the capabilities.
// 5. Write the bundle.
//
// Each step is logged twice: to the per-build BuildLog (returned to the
// caller when debug is on) and as a tracing event for the host process.

use pb_bundle::{BundleContents, LoadOptions, Manifest, SourceInput, WasmResolver};
use pb_capabilities::CapabilityResolver;
use pb_compiler::{CompileOptions, CompiledPolicy, Compiler, Target};

use crate::error::BuildError;
use crate::log::{sink_for, BuildLog, LogLevel};
use crate::outcome::{Artifact, BuildOutcome};
use crate::request::BuildRequest;
use crate::version::VersionInfo;

/// Module path of the wasm binary inside a bundle, as named by the manifest.
const WASM_MODULE_PATH: &str = "/policy.wasm";

/// Runs builds against one capability resolver.
///
/// Holds no per-build state; a single pipeline may serve concurrent builds.
#[derive(Debug, Clone)]
pub struct CompilationPipeline {
    resolver: CapabilityResolver,
}

impl Default for CompilationPipeline {
    fn default() -> Self {
        Self::new(CapabilityResolver::new())
    }
}

impl CompilationPipeline {
    pub fn new(resolver: CapabilityResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &CapabilityResolver {
        &self.resolver
    }

    /// Run one build. Never panics on bad input; every failure is reported
    /// in the outcome.
    pub fn build(&self, request: &BuildRequest) -> BuildOutcome {
        let mut log = sink_for(request.debug);
        let result = self.build_with_log(request, &mut *log);
        if let Err(e) = &result {
            note(&mut *log, LogLevel::Error, &format!("build failed: {}", e));
        }
        BuildOutcome {
            result,
            log: log.transcript(),
        }
    }

    /// Run one build, writing progress to `log`.
    pub fn build_with_log(
        &self,
        request: &BuildRequest,
        log: &mut dyn BuildLog,
    ) -> Result<Artifact, BuildError> {
        let version = VersionInfo::current();
        note(log, LogLevel::Info, &format!("Compiler version: {}", version.lib_version));

        let target = request.validate()?;
        let entrypoints = request.effective_entrypoints();
        note(
            log,
            LogLevel::Debug,
            &format!(
                "target={} bundle_mode={} entrypoints=[{}]",
                target,
                request.bundle_mode,
                entrypoints.join(", ")
            ),
        );

        let capabilities_file = request.effective_capabilities_file();
        let capabilities_version = request.effective_capabilities_version();
        let caps = self.resolver.resolve(capabilities_file, capabilities_version)?;
        note(
            log,
            LogLevel::Debug,
            &format!(
                "capabilities: file={} version={} builtins={}",
                capabilities_file.map_or_else(|| "-".to_string(), |p| p.display().to_string()),
                capabilities_version.unwrap_or("-"),
                caps.builtins.len()
            ),
        );

        let inputs: Vec<SourceInput> = request.sources.iter().map(|s| s.to_input()).collect();
        let loaded = pb_bundle::load(
            &inputs,
            &LoadOptions {
                bundle_mode: request.bundle_mode,
                ignore: request.ignore.clone(),
            },
        )?;
        note(
            log,
            LogLevel::Debug,
            &format!(
                "loaded {} module(s), data={}",
                loaded.modules.len(),
                !loaded.data.is_empty()
            ),
        );

        let compiled = Compiler::new(
            &caps,
            CompileOptions {
                target,
                entrypoints,
            },
        )
        .compile(&loaded.modules)?;
        note(
            log,
            LogLevel::Debug,
            &format!(
                "compiled: entrypoints=[{}] reachable rules={}",
                compiled
                    .entrypoints
                    .iter()
                    .map(|e| e.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                compiled.plan.rules.len()
            ),
        );

        let manifest = output_manifest(request, loaded.manifest.as_ref(), &compiled, target);
        let modules = bundled_modules(&compiled, request.prune_unused);
        if modules.len() < compiled.modules.len() {
            note(
                log,
                LogLevel::Info,
                &format!(
                    "pruned {} unused module(s)",
                    compiled.modules.len() - modules.len()
                ),
            );
        }

        let bytes = pb_bundle::write_bundle(&BundleContents {
            manifest: &manifest,
            data: &loaded.data,
            modules,
            plan: match target {
                Target::Plan => compiled.plan_json.as_deref(),
                _ => None,
            },
            wasm: compiled.wasm.as_deref(),
        })?;

        let artifact = Artifact::new(bytes);
        note(
            log,
            LogLevel::Info,
            &format!("bundle written: {} bytes, sha256 {}", artifact.len(), artifact.digest()),
        );
        Ok(artifact)
    }
}

/// Build with the process-wide default capabilities.
pub fn build(request: &BuildRequest) -> BuildOutcome {
    CompilationPipeline::default().build(request)
}

fn note(log: &mut dyn BuildLog, level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => {
            tracing::debug!("{}", message);
            log.debug(message);
        }
        LogLevel::Info => {
            tracing::info!("{}", message);
            log.info(message);
        }
        LogLevel::Warn => {
            tracing::warn!("{}", message);
            log.warn(message);
        }
        LogLevel::Error => {
            tracing::error!("{}", message);
            log.error(message);
        }
    }
}

/// The `.manifest` written into the output bundle.
///
/// Revision: the request's, else the source bundle's, else empty. Roots and
/// metadata carry over from the source bundle.
fn output_manifest(
    request: &BuildRequest,
    source: Option<&Manifest>,
    compiled: &CompiledPolicy,
    target: Target,
) -> Manifest {
    let revision = request
        .revision
        .clone()
        .or_else(|| source.map(|m| m.revision.clone()))
        .unwrap_or_default();
    let roots = source.map_or_else(|| vec![String::new()], Manifest::effective_roots);

    let wasm = if target == Target::Wasm {
        compiled
            .entrypoints
            .iter()
            .map(|e| WasmResolver {
                entrypoint: e.name.clone(),
                module: WASM_MODULE_PATH.to_string(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let all_v1 = !compiled.modules.is_empty() && compiled.modules.iter().all(|m| m.rego_v1);

    Manifest {
        revision,
        roots: Some(roots),
        wasm,
        rego_version: Some(if all_v1 { 1 } else { 0 }),
        metadata: source.and_then(|m| m.metadata.clone()),
    }
}

fn bundled_modules(compiled: &CompiledPolicy, prune_unused: bool) -> Vec<(&str, &str)> {
    compiled
        .modules
        .iter()
        .filter(|m| !prune_unused || compiled.is_reachable(&m.file))
        .map(|m| (m.file.as_str(), m.source.as_str()))
        .collect()
}
