//! Generation: the loop that turns documents into verified artifacts.
//!
//! # Pass state machine
//!
//! ```text
//!  Start ──► Generate ──► Extract ──► Verify ──► Success ──► finalize
//!               ▲            │           │
//!               │   unusable │           │ failed build
//!               │            ▼           ▼
//!               └──────────── Retry ◄── classify ──► FatalAbort
//!                      (ErrorHistory grows)   (after grace passes,
//!                                              if the callback agrees)
//! ```
//!
//! Transport retries happen inside `Generate` and never count as passes;
//! a pass is consumed by every trip around the outer loop, whether it ended
//! at `Extract` or at `Verify`.
//!
//! # Modules
//!
//! - [`engine`]: the bounded loop, callbacks, outcomes
//! - [`classify`]: ordered rule table for failed builds
//! - [`extract`]: envelopes and code fences
//! - [`prompt`]: prompt assembly
//! - [`history`]: bounded error memory
//! - [`finalize`]: retried moves into the output path
//! - [`single`]: transpile and asset modes
//! - [`architect`]: multi-file projects

pub mod architect;
pub mod classify;
pub mod engine;
pub mod extract;
pub mod finalize;
pub mod history;
pub mod prompt;
pub mod single;

pub use classify::{CLASSIFICATION_RULES, ErrorKind, classify};
pub use engine::{
    FatalDecision, GenerationLoop, LoopCallback, LoopOutcome, PassFailure, SilentCallback, Target,
    Verdict, Verification,
};
pub use extract::{ExtractionError, FenceMode};
pub use history::ErrorHistory;
pub use prompt::PromptSource;

use crate::context::{GenerationMode, RunContext};
use crate::preprocess::AggregatedContext;

/// The prompt the first pass would send.
pub fn first_prompt(ctx: &RunContext, input: &AggregatedContext) -> String {
    let history = ErrorHistory::new(ctx.limits.history_budget);

    if ctx.mode == GenerationMode::Architect {
        if let Some(entry) = architect::usable_blueprint(input).first() {
            let profile = architect::profile_for(ctx, &entry.filename);
            let source = PromptSource::BlueprintFile {
                filename: &entry.filename,
                specification: &entry.content,
                project_memory: "",
            };
            return prompt::build_prompt(ctx, profile, source, &history);
        }
        return prompt::build_prompt(ctx, &ctx.profile, PromptSource::Fresh { input: input.text() }, &history);
    }

    let existing = if ctx.update { single::load_existing(ctx) } else { None };
    let source = match existing.as_deref() {
        Some(existing) => PromptSource::Update { existing },
        None => PromptSource::Fresh { input: input.text() },
    };
    prompt::build_prompt(ctx, &ctx.profile, source, &history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context_for;

    #[test]
    fn test_first_prompt_uses_first_blueprint_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut ctx = context_for(temp.path(), "cpp");
        ctx.mode = GenerationMode::Architect;
        let input = AggregatedContext::from_text("EXPORT: \"a.py\"\nhello\nEXPORT: \"b.py\"\nworld\n");

        let prompt = first_prompt(&ctx, &input);
        assert!(prompt.contains("`a.py`"));
        assert!(prompt.contains("Python"));
        assert!(!prompt.contains("world"));
    }

    #[test]
    fn test_first_prompt_fresh() {
        let temp = tempfile::TempDir::new().unwrap();
        let ctx = context_for(temp.path(), "go");
        let prompt = first_prompt(&ctx, &AggregatedContext::from_text("sum two numbers"));
        assert!(prompt.contains("SOURCE DOCUMENTS:\nsum two numbers"));
    }
}
