//! Core engine for the kiln generative build orchestrator.
//!
//! This crate provides:
//! - Input aggregation with import resolution, export splitting and template stripping
//! - Language profiles and the toolchain boundary
//! - Dependency preflight probes
//! - A content-hash build cache
//! - The bounded generate/verify loop, single-file and multi-file

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod generate;
pub mod paths;
pub mod pipeline;
pub mod preflight;
pub mod preprocess;
pub mod profile;
pub mod service;
pub mod toolchain;

pub use cache::{BuildCache, CacheKey};
pub use config::Settings;
pub use context::{GenerationMode, LoopLimits, RunContext};
pub use error::{Error, Result};
pub use generate::{FatalDecision, LoopCallback, LoopOutcome, PassFailure, SilentCallback};
pub use paths::WorkDirs;
pub use preprocess::{AggregatedContext, aggregate};
pub use profile::{LanguageProfile, ProfileRegistry};
pub use service::{GenerationService, HttpGenerationService, Protocol, ProviderConfig, TransportError};
pub use toolchain::{BuildOutput, SystemToolchain, Toolchain};

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use crate::context::{GenerationMode, LoopLimits, RunContext};
    use crate::error::Result;
    use crate::paths::WorkDirs;
    use crate::profile::ProfileRegistry;
    use crate::service::{GenerationService, Protocol, RetryPolicy, TransportError};
    use crate::toolchain::{BuildOutput, Toolchain};

    /// Context rooted in `dir` with instant retries.
    pub fn context_for(dir: &Path, profile_id: &str) -> RunContext {
        let registry = ProfileRegistry::builtin();
        let profile = registry.lookup_by_id(profile_id).unwrap().clone();
        RunContext {
            mode: GenerationMode::default_for(&profile),
            profile,
            registry,
            model_id: "test/model".to_string(),
            protocol: Protocol::OpenAi,
            output: dir.join("out"),
            dirs: WorkDirs::in_dir(dir).unwrap(),
            instructions: None,
            update: false,
            dry_run: false,
            keep_source: false,
            skip_preflight: false,
            limits: LoopLimits {
                transport: RetryPolicy {
                    max_retries: 0,
                    base_delay: Duration::ZERO,
                },
                finalize_backoff: Duration::ZERO,
                ..LoopLimits::default()
            },
        }
    }

    /// An OpenAI chat completion whose content is `content`.
    pub fn openai_reply(content: &str) -> String {
        serde_json::json!({ "choices": [{ "message": { "content": content } }] }).to_string()
    }

    pub fn passing() -> BuildOutput {
        BuildOutput {
            exit_code: 0,
            output: String::new(),
        }
    }

    pub fn failing(output: &str) -> BuildOutput {
        BuildOutput {
            exit_code: 1,
            output: output.to_string(),
        }
    }

    /// Service replaying canned responses, then failing.
    pub struct ScriptedService {
        replies: RefCell<VecDeque<std::result::Result<String, TransportError>>>,
        repeat: Option<String>,
        prompts: RefCell<Vec<String>>,
    }

    impl ScriptedService {
        pub fn new(replies: Vec<std::result::Result<String, TransportError>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                repeat: None,
                prompts: RefCell::new(Vec::new()),
            }
        }

        /// Service answering every prompt with `reply`.
        pub fn repeating(reply: String) -> Self {
            Self {
                repeat: Some(reply),
                ..Self::new(Vec::new())
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.borrow().len()
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.borrow().clone()
        }
    }

    impl GenerationService for ScriptedService {
        fn complete(&self, prompt: &str) -> std::result::Result<String, TransportError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            if let Some(reply) = self.replies.borrow_mut().pop_front() {
                return reply;
            }
            match &self.repeat {
                Some(reply) => Ok(reply.clone()),
                None => Err(TransportError::Request("script exhausted".to_string())),
            }
        }

        fn identity(&self) -> &str {
            "test/model"
        }
    }

    /// Toolchain replaying build results; the last one repeats.
    pub struct ScriptedToolchain {
        outputs: RefCell<VecDeque<BuildOutput>>,
        emit_outputs: bool,
        probe_code: i32,
        commands: RefCell<Vec<String>>,
        probes: Cell<usize>,
    }

    impl ScriptedToolchain {
        pub fn new(outputs: Vec<BuildOutput>) -> Self {
            Self {
                outputs: RefCell::new(outputs.into()),
                emit_outputs: true,
                probe_code: 0,
                commands: RefCell::new(Vec::new()),
                probes: Cell::new(0),
            }
        }

        /// Successful builds leave nothing at `{out}`.
        pub fn without_outputs(mut self) -> Self {
            self.emit_outputs = false;
            self
        }

        pub fn with_probe_code(mut self, code: i32) -> Self {
            self.probe_code = code;
            self
        }

        pub fn build_calls(&self) -> usize {
            self.commands.borrow().len()
        }

        pub fn probe_calls(&self) -> usize {
            self.probes.get()
        }

        pub fn commands(&self) -> Vec<String> {
            self.commands.borrow().clone()
        }
    }

    impl Toolchain for ScriptedToolchain {
        fn probe(&self, _command: &str) -> Result<i32> {
            self.probes.set(self.probes.get() + 1);
            Ok(self.probe_code)
        }

        fn build(&self, command: &str, _src: &Path, out: &Path) -> Result<BuildOutput> {
            self.commands.borrow_mut().push(command.to_string());
            let result = {
                let mut outputs = self.outputs.borrow_mut();
                if outputs.len() > 1 {
                    outputs.pop_front()
                } else {
                    outputs.front().cloned()
                }
            }
            .unwrap_or_else(passing);

            if result.success() && self.emit_outputs {
                fs::write(out, b"binary")?;
            }
            Ok(result)
        }
    }
}
