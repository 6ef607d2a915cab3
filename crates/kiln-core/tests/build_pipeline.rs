//! End-to-end builds against a fake generation service and toolchain.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kiln_core::generate::FatalDecision;
use kiln_core::service::RetryPolicy;
use kiln_core::{
    AggregatedContext, BuildOutput, GenerationMode, GenerationService, LoopCallback, LoopLimits,
    LoopOutcome, ProfileRegistry, Protocol, RunContext, SilentCallback, Toolchain, TransportError,
    WorkDirs, aggregate, pipeline,
};
use tempfile::TempDir;

struct FakeService {
    reply: String,
    calls: Cell<usize>,
}

impl FakeService {
    fn answering(code: &str) -> Self {
        let reply = serde_json::json!({ "choices": [{ "message": { "content": format!("```\n{code}\n```") } }] });
        Self {
            reply: reply.to_string(),
            calls: Cell::new(0),
        }
    }
}

impl GenerationService for FakeService {
    fn complete(&self, _prompt: &str) -> Result<String, TransportError> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.reply.clone())
    }

    fn identity(&self) -> &str {
        "fake/model"
    }
}

struct FakeToolchain {
    exit_code: i32,
    output: String,
    calls: Cell<usize>,
}

impl FakeToolchain {
    fn succeeding() -> Self {
        Self {
            exit_code: 0,
            output: String::new(),
            calls: Cell::new(0),
        }
    }

    fn failing_with(output: &str) -> Self {
        Self {
            exit_code: 1,
            output: output.to_string(),
            calls: Cell::new(0),
        }
    }
}

impl Toolchain for FakeToolchain {
    fn probe(&self, _command: &str) -> kiln_core::Result<i32> {
        self.calls.set(self.calls.get() + 1);
        Ok(0)
    }

    fn build(&self, _command: &str, _src: &Path, out: &Path) -> kiln_core::Result<BuildOutput> {
        self.calls.set(self.calls.get() + 1);
        if self.exit_code == 0 {
            fs::write(out, b"\x7fELF")?;
        }
        Ok(BuildOutput {
            exit_code: self.exit_code,
            output: self.output.clone(),
        })
    }
}

#[derive(Default)]
struct RecordingCallback {
    passes: RefCell<Vec<u32>>,
    fatal_offers: RefCell<Vec<u32>>,
}

impl LoopCallback for RecordingCallback {
    fn on_pass_started(&self, pass: u32, _max_passes: u32) {
        self.passes.borrow_mut().push(pass);
    }

    fn on_dependency_fatal(&self, pass: u32, _excerpt: &str) -> FatalDecision {
        self.fatal_offers.borrow_mut().push(pass);
        FatalDecision::Abort
    }
}

fn context(dir: &Path, profile_id: &str) -> RunContext {
    let registry = ProfileRegistry::builtin();
    let profile = registry.lookup_by_id(profile_id).unwrap().clone();
    RunContext {
        mode: GenerationMode::default_for(&profile),
        profile,
        registry,
        model_id: "fake/model".to_string(),
        protocol: Protocol::OpenAi,
        output: dir.join("app"),
        dirs: WorkDirs::in_dir(dir).unwrap(),
        instructions: None,
        update: false,
        dry_run: false,
        keep_source: false,
        skip_preflight: true,
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

fn write_input(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("app.md");
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_second_run_is_cache_hit_without_external_calls() {
    let temp = TempDir::new().unwrap();
    let input = aggregate(&[write_input(temp.path(), "print hello")]).unwrap();
    let ctx = context(temp.path(), "cpp");

    let service = FakeService::answering("int main() {}");
    let toolchain = FakeToolchain::succeeding();
    let first = pipeline::build(&ctx, &service, &toolchain, &SilentCallback, &input).unwrap();
    assert!(matches!(first, LoopOutcome::Finalized { passes: 1, .. }));
    assert!(ctx.output.exists());

    let service = FakeService::answering("int main() {}");
    let toolchain = FakeToolchain::succeeding();
    let second = pipeline::build(&ctx, &service, &toolchain, &SilentCallback, &input).unwrap();

    assert_eq!(
        second,
        LoopOutcome::CacheHit {
            output: ctx.output.clone()
        }
    );
    assert_eq!(service.calls.get(), 0);
    assert_eq!(toolchain.calls.get(), 0);
}

#[test]
fn test_deleted_output_forces_regeneration() {
    let temp = TempDir::new().unwrap();
    let input = aggregate(&[write_input(temp.path(), "print hello")]).unwrap();
    let ctx = context(temp.path(), "cpp");

    let service = FakeService::answering("int main() {}");
    let toolchain = FakeToolchain::succeeding();
    pipeline::build(&ctx, &service, &toolchain, &SilentCallback, &input).unwrap();
    fs::remove_file(&ctx.output).unwrap();

    let outcome = pipeline::build(&ctx, &service, &toolchain, &SilentCallback, &input).unwrap();
    assert!(matches!(outcome, LoopOutcome::Finalized { .. }));
    assert_eq!(service.calls.get(), 2);
}

#[test]
fn test_changed_key_forces_regeneration() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path(), "cpp");
    let service = FakeService::answering("int main() {}");
    let toolchain = FakeToolchain::succeeding();

    let input = AggregatedContext::from_text("print hello");
    pipeline::build(&ctx, &service, &toolchain, &SilentCallback, &input).unwrap();

    let changed_input = AggregatedContext::from_text("print goodbye");
    pipeline::build(&ctx, &service, &toolchain, &SilentCallback, &changed_input).unwrap();
    assert_eq!(service.calls.get(), 2);

    let mut other_model = ctx.clone();
    other_model.model_id = "fake/bigger-model".to_string();
    pipeline::build(&other_model, &service, &toolchain, &SilentCallback, &changed_input).unwrap();
    assert_eq!(service.calls.get(), 3);
}

#[test]
fn test_update_mode_bypasses_cache() {
    let temp = TempDir::new().unwrap();
    let mut ctx = context(temp.path(), "python");
    ctx.output = temp.path().join("app.py");
    let service = FakeService::answering("print('hello')");
    let toolchain = FakeToolchain::succeeding();
    let input = AggregatedContext::from_text("print hello");

    pipeline::build(&ctx, &service, &toolchain, &SilentCallback, &input).unwrap();
    ctx.update = true;
    pipeline::build(&ctx, &service, &toolchain, &SilentCallback, &input).unwrap();

    assert_eq!(service.calls.get(), 2);
    assert_eq!(fs::read_to_string(&ctx.output).unwrap(), "print('hello')\n");
}

#[test]
fn test_missing_header_offers_abort_before_exhaustion() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path(), "cpp");
    let service = FakeService::answering("#include <foo.h>\nint main() {}");
    let toolchain = FakeToolchain::failing_with("main.cpp:1:10: fatal error: foo.h: No such file or directory");
    let callback = RecordingCallback::default();

    let outcome = pipeline::build(
        &ctx,
        &service,
        &toolchain,
        &callback,
        &AggregatedContext::from_text("use foo"),
    )
    .unwrap();

    assert_eq!(
        outcome,
        LoopOutcome::Aborted {
            passes: ctx.limits.fatal_grace_passes,
            diagnosis: None
        }
    );
    assert_eq!(*callback.fatal_offers.borrow(), vec![ctx.limits.fatal_grace_passes]);
    assert!(callback.passes.borrow().len() < ctx.limits.max_passes as usize);
    assert!(!ctx.output.exists());
    assert!(!outcome.is_success());
}

#[test]
fn test_asset_written_verbatim() {
    let temp = TempDir::new().unwrap();
    let mut ctx = context(temp.path(), "svg");
    ctx.output = temp.path().join("logo.svg");
    let service = FakeService::answering("<svg xmlns=\"http://www.w3.org/2000/svg\"/>");
    let toolchain = FakeToolchain::succeeding();

    let outcome = pipeline::build(
        &ctx,
        &service,
        &toolchain,
        &SilentCallback,
        &AggregatedContext::from_text("a logo"),
    )
    .unwrap();

    assert!(outcome.is_success());
    assert_eq!(toolchain.calls.get(), 0);
    assert_eq!(
        fs::read_to_string(&ctx.output).unwrap(),
        "<svg xmlns=\"http://www.w3.org/2000/svg\"/>\n"
    );
}
