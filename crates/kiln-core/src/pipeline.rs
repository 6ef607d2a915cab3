//! The end-to-end build of one invocation.
//!
//! ```text
//! dry run? ──► first prompt
//! cache hit? ──► done, no external calls
//! toolchain probe ──► dependency preflight ──► generation loop ──► cache record
//! ```

use crate::cache::{BuildCache, CacheKey};
use crate::context::{GenerationMode, RunContext};
use crate::error::{Error, Result};
use crate::generate::{LoopCallback, LoopOutcome, architect, first_prompt, single};
use crate::preflight::{DependencyPreflightChecker, PreflightOutcome, collect_dependencies};
use crate::preprocess::AggregatedContext;
use crate::service::GenerationService;
use crate::toolchain::{Toolchain, ensure_available};

/// Cache key of this invocation.
pub fn cache_key<'a>(ctx: &'a RunContext, input: &'a AggregatedContext) -> CacheKey<'a> {
    CacheKey {
        resolved_input: input.text(),
        profile_id: &ctx.profile.id,
        model_id: &ctx.model_id,
        update_mode: ctx.update,
        generation_mode: ctx.mode.name(),
    }
}

/// Probe the dependencies the input mentions.
pub fn preflight(ctx: &RunContext, toolchain: &dyn Toolchain, input: &AggregatedContext) -> Result<()> {
    if !ctx.profile.supports_preflight() {
        tracing::debug!("Preflight not supported for {}", ctx.profile.id);
        return Ok(());
    }

    let deps = collect_dependencies(input);
    let checker = DependencyPreflightChecker::new(toolchain, &ctx.profile);
    match checker.check(&deps, &ctx.dirs.build_dir.join("preflight"))? {
        PreflightOutcome::Passed => {
            tracing::info!("Preflight passed");
            Ok(())
        }
        PreflightOutcome::Skipped => Ok(()),
        PreflightOutcome::Failed { missing } => Err(Error::Preflight { missing }),
    }
}

/// Build the artifact described by `input`.
pub fn build(
    ctx: &RunContext,
    service: &dyn GenerationService,
    toolchain: &dyn Toolchain,
    callback: &dyn LoopCallback,
    input: &AggregatedContext,
) -> Result<LoopOutcome> {
    if ctx.dry_run {
        return Ok(LoopOutcome::DryRun {
            prompt: first_prompt(ctx, input),
        });
    }

    let digest = cache_key(ctx, input).digest();
    let cache = BuildCache::for_output(&ctx.dirs.cache_dir, &ctx.output);

    if !ctx.update && cache.should_skip(&digest, ctx.output.exists()) {
        tracing::info!("Cache hit for {}", ctx.output.display());
        return Ok(LoopOutcome::CacheHit {
            output: ctx.output.clone(),
        });
    }

    if ctx.mode != GenerationMode::Asset {
        ensure_available(toolchain, &ctx.profile)?;
        if ctx.skip_preflight {
            tracing::debug!("Preflight skipped");
        } else {
            preflight(ctx, toolchain, input)?;
        }
    }

    let outcome = match ctx.mode {
        GenerationMode::Architect => architect::generate_project(ctx, service, toolchain, callback, input)?,
        GenerationMode::Transpile | GenerationMode::Asset => {
            single::generate_single(ctx, service, toolchain, callback, input)?
        }
    };

    if let LoopOutcome::Finalized { .. } = outcome {
        cache.record(&digest)?;
    }
    Ok(outcome)
}
