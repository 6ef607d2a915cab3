//! Single-artifact generation: transpile and asset modes.

use std::fs;

use crate::context::{GenerationMode, RunContext};
use crate::error::Result;
use crate::preprocess::AggregatedContext;
use crate::service::GenerationService;
use crate::toolchain::Toolchain;

use super::engine::{GenerationLoop, LoopCallback, LoopOutcome, Target, Verdict, Verification};
use super::extract::FenceMode;
use super::finalize::relocate;
use super::prompt::PromptSource;

/// Existing artifact to rework in update mode.
///
/// A missing or unreadable artifact falls back to fresh generation.
pub fn load_existing(ctx: &RunContext) -> Option<String> {
    let path = ctx.existing_artifact_path();
    match fs::read_to_string(&path) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(
                "No existing artifact at {} ({}), generating from the input instead",
                path.display(),
                e
            );
            None
        }
    }
}

fn verification_for(ctx: &RunContext) -> Verification {
    match ctx.mode {
        GenerationMode::Asset => Verification::None,
        _ => Verification::Build,
    }
}

/// Generate, verify and install one artifact at `ctx.output`.
pub fn generate_single(
    ctx: &RunContext,
    service: &dyn GenerationService,
    toolchain: &dyn Toolchain,
    callback: &dyn LoopCallback,
    input: &AggregatedContext,
) -> Result<LoopOutcome> {
    let existing = if ctx.update { load_existing(ctx) } else { None };
    let source = match existing.as_deref() {
        Some(existing) => PromptSource::Update { existing },
        None => PromptSource::Fresh { input: input.text() },
    };

    let target = Target {
        profile: &ctx.profile,
        verification: verification_for(ctx),
        fence: FenceMode::FirstBlock,
        source_path: ctx.dirs.pending_source(&ctx.profile.file_extension),
    };

    let mut engine = GenerationLoop::new(ctx, service, toolchain, callback);
    match engine.run(&target, source)? {
        Verdict::Verified { passes, .. } => {
            install(ctx, &target)?;
            Ok(LoopOutcome::Finalized {
                output: ctx.output.clone(),
                passes,
            })
        }
        Verdict::Exhausted { passes } => Ok(LoopOutcome::Exhausted { passes }),
        Verdict::Aborted { passes, diagnosis } => Ok(LoopOutcome::Aborted { passes, diagnosis }),
    }
}

/// Move the verified temporaries to the output path.
fn install(ctx: &RunContext, target: &Target<'_>) -> Result<()> {
    let attempts = ctx.limits.finalize_attempts;
    let backoff = ctx.limits.finalize_backoff;

    if !(target.verification == Verification::Build && target.profile.produces_binary) {
        return relocate(&target.source_path, &ctx.output, attempts, backoff);
    }

    // A binary is installed only after its kept source.
    let kept = ctx.kept_source_path();
    let keep = ctx.keep_source && kept != ctx.output;
    if keep {
        relocate(&target.source_path, &kept, attempts, backoff)?;
    } else if ctx.keep_source {
        tracing::warn!("Not keeping source: {} is the binary output", kept.display());
    }

    relocate(&ctx.dirs.pending_binary(), &ctx.output, attempts, backoff)?;

    if !keep {
        let _ = fs::remove_file(&target.source_path);
    }
    Ok(())
}
