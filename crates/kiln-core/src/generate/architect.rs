//! Multi-file project generation.
//!
//! With a blueprint in the input, every named file gets its own bounded loop,
//! in order, and sees the files written before it. Without one, a single
//! response is split on its export directives. Either way the output path is
//! a directory, and nothing is installed there until the whole project is
//! ready.

use std::fs;
use std::path::{Path, PathBuf};

use crate::context::RunContext;
use crate::error::Result;
use crate::preprocess::{AggregatedContext, BlueprintEntry, ExportReport, is_contained, parse_blueprint, process_exports};
use crate::profile::LanguageProfile;
use crate::service::GenerationService;
use crate::toolchain::Toolchain;

use super::engine::{GenerationLoop, LoopCallback, LoopOutcome, Target, Verdict, Verification};
use super::extract::FenceMode;
use super::finalize::{install_copy, relocate};
use super::prompt::PromptSource;

/// Profile of a project file.
///
/// Extensions of the run's own language (a `.h` in a C++ project) keep the
/// run profile; others go through the registry, falling back to the run's.
pub fn profile_for<'c>(ctx: &'c RunContext, filename: &str) -> &'c LanguageProfile {
    let path = Path::new(filename);
    let ext = path.extension().and_then(|ext| ext.to_str());
    if ext.is_some_and(|ext| ctx.profile.owns_extension(ext)) {
        return &ctx.profile;
    }
    ctx.registry.lookup_by_path(path).unwrap_or(&ctx.profile)
}

/// Blueprint entries that can be written inside the output directory.
pub fn usable_blueprint(input: &AggregatedContext) -> Vec<BlueprintEntry> {
    parse_blueprint(input.text())
        .into_iter()
        .filter(|entry| {
            let ok = is_contained(&entry.filename);
            if !ok {
                tracing::warn!("Skipping blueprint entry outside the project: {}", entry.filename);
            }
            ok
        })
        .collect()
}

/// Where a split response's files wait before installation.
pub(crate) fn exports_staging(ctx: &RunContext) -> PathBuf {
    ctx.dirs.build_dir.join("exports")
}

/// Split `code` into a freshly emptied `staging` directory.
pub(crate) fn stage_exports(staging: &Path, code: &str) -> Result<ExportReport> {
    reset_dir(staging)?;
    Ok(process_exports(code, staging))
}

fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Generate a project into the directory `ctx.output`.
pub fn generate_project(
    ctx: &RunContext,
    service: &dyn GenerationService,
    toolchain: &dyn Toolchain,
    callback: &dyn LoopCallback,
    input: &AggregatedContext,
) -> Result<LoopOutcome> {
    if ctx.update {
        tracing::warn!("Update mode does not apply to projects, generating from the input");
    }

    let blueprint = usable_blueprint(input);
    if blueprint.is_empty() {
        generate_split(ctx, service, toolchain, callback, input)
    } else {
        tracing::info!("Blueprint with {} files", blueprint.len());
        generate_blueprint(ctx, service, toolchain, callback, &blueprint)
    }
}

fn generate_blueprint(
    ctx: &RunContext,
    service: &dyn GenerationService,
    toolchain: &dyn Toolchain,
    callback: &dyn LoopCallback,
    blueprint: &[BlueprintEntry],
) -> Result<LoopOutcome> {
    let staging = ctx.dirs.project_dir();
    reset_dir(&staging)?;

    let mut memory = String::new();
    let mut total_passes = 0;

    for (index, entry) in blueprint.iter().enumerate() {
        callback.on_file_started(index + 1, blueprint.len(), &entry.filename);

        let profile = profile_for(ctx, &entry.filename);
        let target = Target {
            profile,
            verification: Verification::for_project_file(profile),
            fence: FenceMode::FirstBlock,
            source_path: staging.join(&entry.filename),
        };
        let source = PromptSource::BlueprintFile {
            filename: &entry.filename,
            specification: &entry.content,
            project_memory: &memory,
        };

        let mut engine = GenerationLoop::new(ctx, service, toolchain, callback);
        match engine.run(&target, source)? {
            Verdict::Verified { code, passes } => {
                total_passes += passes;
                memory.push_str(&format!("// {}\n{}\n", entry.filename, code.trim_end()));
            }
            Verdict::Exhausted { passes } => {
                tracing::warn!("Could not generate {}", entry.filename);
                return Ok(LoopOutcome::Exhausted {
                    passes: total_passes + passes,
                });
            }
            Verdict::Aborted { passes, diagnosis } => {
                return Ok(LoopOutcome::Aborted {
                    passes: total_passes + passes,
                    diagnosis,
                });
            }
        }
    }

    for entry in blueprint {
        install_copy(
            &staging.join(&entry.filename),
            &ctx.output.join(&entry.filename),
            ctx.limits.finalize_attempts,
            ctx.limits.finalize_backoff,
        )?;
    }

    Ok(LoopOutcome::Finalized {
        output: ctx.output.clone(),
        passes: total_passes,
    })
}

fn generate_split(
    ctx: &RunContext,
    service: &dyn GenerationService,
    toolchain: &dyn Toolchain,
    callback: &dyn LoopCallback,
    input: &AggregatedContext,
) -> Result<LoopOutcome> {
    let target = Target {
        profile: &ctx.profile,
        verification: Verification::Exports,
        fence: FenceMode::StripFences,
        source_path: ctx.dirs.build_dir.join("project.txt"),
    };

    let mut engine = GenerationLoop::new(ctx, service, toolchain, callback);
    let (code, passes) = match engine.run(&target, PromptSource::Fresh { input: input.text() })? {
        Verdict::Verified { code, passes } => (code, passes),
        Verdict::Exhausted { passes } => return Ok(LoopOutcome::Exhausted { passes }),
        Verdict::Aborted { passes, diagnosis } => return Ok(LoopOutcome::Aborted { passes, diagnosis }),
    };

    let staging = exports_staging(ctx);
    let report = stage_exports(&staging, &code)?;

    let attempts = ctx.limits.finalize_attempts;
    let backoff = ctx.limits.finalize_backoff;

    if !report.has_exports() {
        let single = ctx.output.join(ctx.profile.source_file_name("main"));
        tracing::info!("Response had no export blocks, writing {}", single.display());
        relocate(&target.source_path, &single, attempts, backoff)?;
    } else {
        for written in &report.written {
            let relative: PathBuf = written.strip_prefix(&staging).unwrap_or(written).to_path_buf();
            relocate(written, &ctx.output.join(relative), attempts, backoff)?;
        }
        let _ = fs::remove_file(&target.source_path);
    }

    Ok(LoopOutcome::Finalized {
        output: ctx.output.clone(),
        passes,
    })
}
