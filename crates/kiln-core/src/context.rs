//! Per-invocation settings.
//!
//! A [`RunContext`] is built once at startup and handed by reference to every
//! component; nothing in the pipeline reads global state.

use std::path::PathBuf;
use std::time::Duration;

use crate::paths::WorkDirs;
use crate::profile::{LanguageProfile, ProfileRegistry};
use crate::service::{Protocol, RetryPolicy};

/// What kind of output the generation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Whole-program translation into one source file.
    Transpile,
    /// Multi-file project generation driven by export directives.
    Architect,
    /// Text or markup asset with no toolchain verification.
    Asset,
}

impl GenerationMode {
    /// Default mode for a profile: assets for build-less profiles.
    pub fn default_for(profile: &LanguageProfile) -> Self {
        if profile.is_asset() {
            GenerationMode::Asset
        } else {
            GenerationMode::Transpile
        }
    }

    /// Stable name, used in cache keys.
    pub fn name(self) -> &'static str {
        match self {
            GenerationMode::Transpile => "transpile",
            GenerationMode::Architect => "architect",
            GenerationMode::Asset => "asset",
        }
    }
}

impl std::str::FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transpile" => Ok(GenerationMode::Transpile),
            "architect" => Ok(GenerationMode::Architect),
            "asset" => Ok(GenerationMode::Asset),
            other => Err(format!("unknown mode '{other}' (expected transpile, architect or asset)")),
        }
    }
}

/// Bounds on every retry in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopLimits {
    /// Generation passes before giving up.
    pub max_passes: u32,
    /// Consecutive dependency-fatal passes before offering to abort.
    pub fatal_grace_passes: u32,
    /// Transport retries around each service call.
    pub transport: RetryPolicy,
    /// Attempts to move the finished artifact into place.
    pub finalize_attempts: u32,
    /// Pause between finalize attempts.
    pub finalize_backoff: Duration,
    /// Character budget of the error history carried between passes.
    pub history_budget: usize,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_passes: 15,
            fatal_grace_passes: 3,
            transport: RetryPolicy::default(),
            finalize_attempts: 5,
            finalize_backoff: Duration::from_millis(200),
            history_budget: 12_000,
        }
    }
}

/// Immutable settings for one invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Target profile.
    pub profile: LanguageProfile,
    /// Registry, for per-file profile lookups in architect mode.
    pub registry: ProfileRegistry,
    /// Generation mode.
    pub mode: GenerationMode,
    /// Identity of the generation service (part of the cache key).
    pub model_id: String,
    /// Envelope protocol of service responses.
    pub protocol: Protocol,
    /// Requested output path (a directory in architect mode).
    pub output: PathBuf,
    /// Working directories next to the output.
    pub dirs: WorkDirs,
    /// Free-text user instructions, included verbatim in every prompt.
    pub instructions: Option<String>,
    /// Rework the existing artifact instead of generating from the input.
    pub update: bool,
    /// Build the prompt and stop.
    pub dry_run: bool,
    /// Keep the generated source next to a binary output.
    pub keep_source: bool,
    /// Skip the dependency preflight probe.
    pub skip_preflight: bool,
    /// Retry bounds.
    pub limits: LoopLimits,
}

impl RunContext {
    /// Where the kept source of a binary output lives.
    pub fn kept_source_path(&self) -> PathBuf {
        self.output.with_extension(&self.profile.file_extension)
    }

    /// The artifact update mode starts from.
    pub fn existing_artifact_path(&self) -> PathBuf {
        if self.profile.produces_binary {
            self.kept_source_path()
        } else {
            self.output.clone()
        }
    }
}
