//! The bounded generate/verify loop.
//!
//! One [`GenerationLoop`] drives one artifact: it prompts the service, pulls
//! code out of the response, verifies it with the toolchain, and feeds what
//! went wrong into the next prompt until the code verifies or the pass budget
//! runs out. Moving the verified artifact into place is left to the caller.

use std::fs;
use std::path::PathBuf;

use crate::context::RunContext;
use crate::error::Result;
use crate::profile::LanguageProfile;
use crate::service::{GenerationService, TransportError, complete_with_backoff};
use crate::toolchain::{BuildOutput, Toolchain};

use super::architect::{exports_staging, stage_exports};
use super::classify::{ErrorKind, RuleInput, classify, corrective_instruction};
use super::extract::{ExtractionError, FenceMode, extract_code, extract_text};
use super::history::{ErrorHistory, excerpt};
use super::prompt::{PromptSource, build_prompt, diagnosis_prompt};

/// Lines of build output shown to the user per failed pass.
const EXCERPT_LINES: usize = 12;

/// Lines of raw build output carried into the error history.
const HISTORY_LINES: usize = 80;

/// How generated code is checked before it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Full build with the profile's build command.
    Build,
    /// Object-only compile with the profile's check command.
    CheckOnly,
    /// Split export blocks into the staging directory; every target must be
    /// written.
    Exports,
    /// Accept any extracted text.
    None,
}

impl Verification {
    /// Verification for one file of a multi-file project.
    ///
    /// Files can't be linked on their own, so a check command is preferred;
    /// profiles that build without producing a binary can be built as-is.
    pub fn for_project_file(profile: &LanguageProfile) -> Self {
        if profile.check_command.is_some() {
            Verification::CheckOnly
        } else if profile.build_command.is_some() && !profile.produces_binary {
            Verification::Build
        } else {
            Verification::None
        }
    }
}

/// What one loop is producing.
#[derive(Debug, Clone)]
pub struct Target<'a> {
    /// Profile the code is written in.
    pub profile: &'a LanguageProfile,
    /// How the code is verified.
    pub verification: Verification,
    /// How fences are handled in responses.
    pub fence: FenceMode,
    /// Where each candidate is written before verification.
    pub source_path: PathBuf,
}

/// Answer to repeated dependency failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalDecision {
    /// Keep trying; the grace period starts over.
    Continue,
    /// Stop now.
    Abort,
    /// Ask the service to explain the failure, then stop.
    AbortWithDiagnosis,
}

/// Why a pass did not produce verified code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassFailure {
    /// No response after all transport retries.
    Transport(TransportError),
    /// A response arrived but held no usable code.
    Extraction(ExtractionError),
    /// The toolchain rejected the code.
    Build {
        kind: ErrorKind,
        excerpt: String,
        exit_code: i32,
    },
}

/// Progress hooks for a running loop.
///
/// Every method has a no-op default; the dependency-fatal prompt defaults to
/// aborting.
pub trait LoopCallback {
    /// A pass is starting.
    fn on_pass_started(&self, _pass: u32, _max_passes: u32) {}

    /// A pass failed.
    fn on_pass_failed(&self, _pass: u32, _failure: &PassFailure) {}

    /// The code of `pass` verified.
    fn on_verified(&self, _pass: u32) {}

    /// Dependency failures outlasted the grace period.
    fn on_dependency_fatal(&self, _pass: u32, _excerpt: &str) -> FatalDecision {
        FatalDecision::Abort
    }

    /// The service explained a dependency failure.
    fn on_diagnosis(&self, _text: &str) {}

    /// A file of a multi-file project is starting (1-based index).
    fn on_file_started(&self, _index: usize, _total: usize, _filename: &str) {}
}

/// Callback that reports nothing and aborts on dependency failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentCallback;

impl LoopCallback for SilentCallback {}

/// How one loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// `code` verified on pass `passes`.
    Verified { code: String, passes: u32 },
    /// The pass budget ran out.
    Exhausted { passes: u32 },
    /// Stopped after repeated dependency failures.
    Aborted { passes: u32, diagnosis: Option<String> },
}

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The artifact is at `output`.
    Finalized { output: PathBuf, passes: u32 },
    /// Nothing changed since the last successful build.
    CacheHit { output: PathBuf },
    /// The first prompt, not sent.
    DryRun { prompt: String },
    /// The pass budget ran out; nothing was written to the output.
    Exhausted { passes: u32 },
    /// Stopped after repeated dependency failures.
    Aborted { passes: u32, diagnosis: Option<String> },
}

impl LoopOutcome {
    /// Whether the invocation should exit successfully.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            LoopOutcome::Finalized { .. } | LoopOutcome::CacheHit { .. } | LoopOutcome::DryRun { .. }
        )
    }
}

/// Drives generate, extract and verify passes for one artifact.
pub struct GenerationLoop<'a> {
    ctx: &'a RunContext,
    service: &'a dyn GenerationService,
    toolchain: &'a dyn Toolchain,
    callback: &'a dyn LoopCallback,
    history: ErrorHistory,
    build_attempts: u32,
}

impl<'a> GenerationLoop<'a> {
    /// Create a loop with an empty error history.
    pub fn new(
        ctx: &'a RunContext,
        service: &'a dyn GenerationService,
        toolchain: &'a dyn Toolchain,
        callback: &'a dyn LoopCallback,
    ) -> Self {
        Self {
            ctx,
            service,
            toolchain,
            callback,
            history: ErrorHistory::new(ctx.limits.history_budget),
            build_attempts: 0,
        }
    }

    /// Failures recorded so far.
    pub fn history(&self) -> &ErrorHistory {
        &self.history
    }

    /// Toolchain invocations made so far.
    pub fn build_attempts(&self) -> u32 {
        self.build_attempts
    }

    /// Run passes until the code verifies, the budget runs out, or the
    /// callback aborts.
    ///
    /// Only toolchain and filesystem errors escape as `Err`; everything the
    /// service or compiler does wrong is retried.
    pub fn run(&mut self, target: &Target<'_>, source: PromptSource<'_>) -> Result<Verdict> {
        let max_passes = self.ctx.limits.max_passes;
        let grace = self.ctx.limits.fatal_grace_passes.max(1);
        let mut fatal_streak = 0u32;

        for pass in 1..=max_passes {
            self.callback.on_pass_started(pass, max_passes);
            let prompt = build_prompt(self.ctx, target.profile, source, &self.history);

            let raw = match complete_with_backoff(self.service, &prompt, &self.ctx.limits.transport) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!("Pass {}: no response: {}", pass, e);
                    self.callback.on_pass_failed(pass, &PassFailure::Transport(e));
                    continue;
                }
            };

            let code = match extract_code(self.ctx.protocol, &raw, target.fence) {
                Ok(code) => code,
                Err(e) => {
                    tracing::warn!("Pass {}: unusable response: {}", pass, e);
                    self.history.push(
                        pass,
                        &format!("The response could not be used ({e}). Reply with the complete code."),
                    );
                    self.callback.on_pass_failed(pass, &PassFailure::Extraction(e));
                    continue;
                }
            };

            let Some(failed) = self.verify(target, &code)? else {
                tracing::info!("Pass {}: verified", pass);
                self.callback.on_verified(pass);
                return Ok(Verdict::Verified { code, passes: pass });
            };

            let kind = classify(&RuleInput {
                output: &failed.output,
                code: &code,
                profile: target.profile,
            });
            let shown = excerpt(&failed.output, EXCERPT_LINES);
            tracing::debug!("Pass {}: build failed ({:?}), exit {}", pass, kind, failed.exit_code);
            self.callback.on_pass_failed(
                pass,
                &PassFailure::Build {
                    kind,
                    excerpt: shown.clone(),
                    exit_code: failed.exit_code,
                },
            );

            match kind {
                ErrorKind::LazyTranslation => {
                    fatal_streak = 0;
                    self.history.push(pass, &corrective_instruction(target.profile));
                }
                ErrorKind::GenericBuildError => {
                    fatal_streak = 0;
                    self.history.push(pass, &excerpt(&failed.output, HISTORY_LINES));
                }
                ErrorKind::DependencyFatal => {
                    fatal_streak += 1;
                    self.history.push(pass, &excerpt(&failed.output, HISTORY_LINES));
                    if fatal_streak < grace {
                        continue;
                    }

                    match self.callback.on_dependency_fatal(pass, &shown) {
                        FatalDecision::Continue => {
                            tracing::info!("Continuing despite missing dependencies");
                            fatal_streak = 0;
                        }
                        FatalDecision::Abort => {
                            return Ok(Verdict::Aborted {
                                passes: pass,
                                diagnosis: None,
                            });
                        }
                        FatalDecision::AbortWithDiagnosis => {
                            let diagnosis = self.diagnose(target.profile, &failed.output);
                            if let Some(text) = &diagnosis {
                                self.callback.on_diagnosis(text);
                            }
                            return Ok(Verdict::Aborted { passes: pass, diagnosis });
                        }
                    }
                }
            }
        }

        tracing::warn!("Giving up after {} passes", max_passes);
        Ok(Verdict::Exhausted { passes: max_passes })
    }

    /// Write `code` and check it. `None` means it verified.
    fn verify(&mut self, target: &Target<'_>, code: &str) -> Result<Option<BuildOutput>> {
        if let Some(parent) = target.source_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target.source_path, code)?;

        let profile = target.profile;
        let (command, out) = match target.verification {
            Verification::None => return Ok(None),
            Verification::Exports => return self.check_exports(code),
            Verification::Build => (profile.build_command.as_deref(), self.ctx.dirs.pending_binary()),
            Verification::CheckOnly => (
                profile.check_command.as_deref(),
                self.ctx.dirs.build_dir.join("pending.o"),
            ),
        };
        let Some(command) = command else {
            return Ok(None);
        };

        let expects_binary = target.verification == Verification::Build && profile.produces_binary;
        if expects_binary && out.exists() {
            fs::remove_file(&out)?;
        }

        self.build_attempts += 1;
        let result = self.toolchain.build(command, &target.source_path, &out)?;

        if target.verification == Verification::CheckOnly {
            let _ = fs::remove_file(&out);
        }

        if !result.success() {
            return Ok(Some(result));
        }
        if expects_binary && !out.exists() {
            return Ok(Some(BuildOutput {
                exit_code: result.exit_code,
                output: format!(
                    "{}\nThe build reported success but produced no binary at {}.",
                    result.output.trim_end(),
                    out.display()
                ),
            }));
        }
        Ok(None)
    }

    /// Stage the export blocks of `code`; refused or unwritable targets fail
    /// the pass.
    fn check_exports(&self, code: &str) -> Result<Option<BuildOutput>> {
        let report = stage_exports(&exports_staging(self.ctx), code)?;
        if report.failed.is_empty() {
            return Ok(None);
        }
        Ok(Some(BuildOutput {
            exit_code: 1,
            output: format!(
                "These export targets could not be written: {}. Every EXPORT path must be relative and stay inside the project.",
                report.failed.join(", ")
            ),
        }))
    }

    /// One-shot request for a plain-language explanation of a failure.
    fn diagnose(&self, profile: &LanguageProfile, build_output: &str) -> Option<String> {
        let prompt = diagnosis_prompt(profile, build_output);
        let raw = match complete_with_backoff(self.service, &prompt, &self.ctx.limits.transport) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Diagnosis request failed: {}", e);
                return None;
            }
        };
        match extract_text(self.ctx.protocol, &raw) {
            Ok(text) => Some(text.trim().to_string()),
            Err(e) => {
                tracing::warn!("Diagnosis response unusable: {}", e);
                None
            }
        }
    }
}
