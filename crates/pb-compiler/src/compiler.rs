// compiler.rs — Compilation driver.
//
// Stages, each of which stops the compilation if it reports errors:
// 1. Parse every module (all modules are parsed, errors accumulate).
// 2. Check modules against the capability set and each other.
// 3. Reject recursive rules.
// 4. Resolve entrypoints.
// 5. Plan the rules reachable from the entrypoints.
// 6. For the wasm target, emit the module.

use std::collections::BTreeSet;

use pb_capabilities::CapabilitySet;

use crate::ast::Module;
use crate::entrypoint::{self, Entrypoint};
use crate::error::{Diagnostic, Diagnostics, ErrorKind};
use crate::graph::RuleIndex;
use crate::parser::parse_module;
use crate::plan::Plan;
use crate::target::Target;
use crate::{check, wasm};

/// One policy file to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceModule {
    /// Logical path, used in diagnostics and as the bundle entry name.
    pub path: String,
    pub text: String,
}

impl SourceModule {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub target: Target,
    /// Requested entrypoints, normalized during resolution.
    pub entrypoints: Vec<String>,
}

/// Result of a successful compilation.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    pub modules: Vec<Module>,
    pub entrypoints: Vec<Entrypoint>,
    pub plan: Plan,
    /// Serialized plan, present for the plan and wasm targets.
    pub plan_json: Option<Vec<u8>>,
    /// Emitted module, present for the wasm target.
    pub wasm: Option<Vec<u8>>,
}

impl CompiledPolicy {
    /// Whether a source file defines any rule reachable from an entrypoint.
    pub fn is_reachable(&self, file: &str) -> bool {
        self.plan.rules.iter().any(|r| r.file == file)
    }

    pub fn reachable_files(&self) -> BTreeSet<&str> {
        self.plan.files()
    }
}

/// Compiles modules against one capability set.
pub struct Compiler<'c> {
    caps: &'c CapabilitySet,
    options: CompileOptions,
}

impl<'c> Compiler<'c> {
    pub fn new(caps: &'c CapabilitySet, options: CompileOptions) -> Self {
        Self { caps, options }
    }

    pub fn compile(&self, sources: &[SourceModule]) -> Result<CompiledPolicy, Diagnostics> {
        tracing::debug!(
            modules = sources.len(),
            build_target = %self.options.target,
            "compiling"
        );

        let mut modules = Vec::with_capacity(sources.len());
        let mut errors = Vec::new();
        for source in sources {
            match parse_module(&source.path, &source.text) {
                Ok(module) => modules.push(module),
                Err(e) => errors.push(e),
            }
        }
        fail_on(errors)?;

        let index = RuleIndex::build(&modules);
        fail_on(check::check(&index, self.caps))?;
        fail_on(index.recursion_errors())?;

        let entrypoints = entrypoint::resolve(&index, &self.options.entrypoints).map_err(Diagnostics)?;
        let roots: Vec<String> = entrypoints.iter().flat_map(|e| e.rules.iter().cloned()).collect();
        let reachable = index.reachable(&roots);
        tracing::debug!(
            entrypoints = entrypoints.len(),
            rules = index.ids().count(),
            reachable = reachable.len(),
            "resolved entrypoints"
        );

        let mut plan = Plan::build(&index, self.caps, entrypoints.clone(), &reachable);

        let (plan_json, wasm) = match self.options.target {
            Target::Rego => (None, None),
            Target::Plan => (Some(plan_json(&plan)?), None),
            Target::Wasm => {
                let abi = self.caps.latest_wasm_abi().ok_or_else(|| {
                    Diagnostics::single(Diagnostic::global(
                        ErrorKind::Compile,
                        "wasm target requires a wasm ABI version in capabilities",
                    ))
                })?;
                plan.wasm_abi = Some(abi);
                let json = plan_json(&plan)?;
                let module = wasm::emit_module(abi, &json);
                (Some(json), Some(module))
            }
        };

        Ok(CompiledPolicy {
            modules,
            entrypoints,
            plan,
            plan_json,
            wasm,
        })
    }
}

fn fail_on(errors: Vec<Diagnostic>) -> Result<(), Diagnostics> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Diagnostics(errors))
    }
}

fn plan_json(plan: &Plan) -> Result<Vec<u8>, Diagnostics> {
    plan.to_json().map_err(|e| {
        Diagnostics::single(Diagnostic::global(
            ErrorKind::Compile,
            format!("plan serialization failed: {}", e),
        ))
    })
}
