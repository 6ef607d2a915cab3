//! Build command implementation for kiln CLI.
//!
//! Aggregates the input documents, assembles the run context from
//! configuration and flags, and drives the generation pipeline.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use kiln_core::{
    GenerationMode, HttpGenerationService, LanguageProfile, LoopOutcome, ProfileRegistry, Protocol,
    RunContext, Settings, SystemToolchain, WorkDirs, aggregate, pipeline,
};

use crate::colors;
use crate::progress::{FatalPolicy, ProgressCallback};

/// Flags of `kiln build`.
#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Input documents, aggregated in order
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output path (a directory in architect mode)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Target profile id (see `kiln profiles`)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Generation mode: transpile, architect or asset
    #[arg(long)]
    pub mode: Option<GenerationMode>,

    /// Extra instructions, followed over the built-in rules
    #[arg(short, long)]
    pub instructions: Option<String>,

    /// Rework the existing artifact instead of starting over
    #[arg(long)]
    pub update: bool,

    /// Print the first prompt and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Keep the generated source next to a binary output
    #[arg(long)]
    pub keep_source: bool,

    /// Skip the dependency preflight probe
    #[arg(long)]
    pub skip_preflight: bool,

    /// Maximum generation passes
    #[arg(long)]
    pub max_passes: Option<u32>,

    /// What to do when dependencies keep failing the build
    #[arg(long, value_enum, default_value_t = FatalPolicy::Ask)]
    pub on_fatal: FatalPolicy,

    /// Configuration file (default: ./kiln.toml)
    #[arg(long, env = "KILN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Service protocol: openai, google or ollama
    #[arg(long)]
    pub protocol: Option<Protocol>,

    /// Model name
    #[arg(long)]
    pub model: Option<String>,

    /// Service base URL
    #[arg(long)]
    pub endpoint: Option<String>,
}

/// Default output path next to the first input.
fn default_output(first_input: &Path, profile: &LanguageProfile, mode: GenerationMode) -> PathBuf {
    let dir = first_input.parent().unwrap_or(Path::new(""));
    let stem = first_input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());

    let candidate = match mode {
        GenerationMode::Architect => dir.join(format!("{stem}_project")),
        _ if profile.produces_binary => dir.join(&stem),
        _ => dir.join(profile.source_file_name(&stem)),
    };

    if candidate == first_input {
        dir.join(profile.source_file_name(&format!("{stem}_kiln")))
    } else {
        candidate
    }
}

/// Execute the build command.
pub fn execute(args: BuildArgs) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut settings = Settings::discover(args.config.as_deref())?;
    if let Some(protocol) = args.protocol {
        settings.provider.protocol = protocol;
    }
    if let Some(model) = args.model.clone() {
        settings.provider.model = model;
    }
    if let Some(endpoint) = args.endpoint.clone() {
        settings.provider.endpoint = Some(endpoint);
    }

    let mut registry = ProfileRegistry::builtin();
    settings.apply_overrides(&mut registry)?;

    let profile = registry
        .resolve_target(args.target.as_deref(), args.output.as_deref(), &args.inputs)?
        .clone();
    let mode = args.mode.unwrap_or_else(|| GenerationMode::default_for(&profile));
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.inputs[0], &profile, mode));

    let mut limits = settings.limits();
    if let Some(max_passes) = args.max_passes {
        limits.max_passes = max_passes.max(1);
    }

    let provider = settings.provider_config();
    let service = HttpGenerationService::new(provider.clone())?;
    let toolchain = SystemToolchain::new();

    let ctx = RunContext {
        dirs: WorkDirs::for_output(&output)?,
        profile,
        registry,
        mode,
        model_id: provider.identity(),
        protocol: provider.protocol,
        output,
        instructions: args.instructions,
        update: args.update,
        dry_run: args.dry_run,
        keep_source: args.keep_source,
        skip_preflight: args.skip_preflight,
        limits,
    };

    let input = aggregate(&args.inputs)?;
    if input.is_empty() {
        anyhow::bail!("input documents are empty");
    }

    if !ctx.dry_run {
        print_header(&ctx);
    }

    let callback = ProgressCallback::new(args.on_fatal);
    let outcome = pipeline::build(&ctx, &service, &toolchain, &callback, &input)?;

    report(&ctx, &outcome, start)
}

fn print_header(ctx: &RunContext) {
    println!(
        "\n{}kiln{} - {} {}{}{} ({}, {})",
        colors::BOLD,
        colors::RESET,
        ctx.mode.name(),
        colors::CYAN,
        ctx.output.display(),
        colors::RESET,
        ctx.profile.display_name,
        ctx.model_id
    );
    println!("{}", "─".repeat(50));
}

/// Print the final summary line; failures become errors.
fn report(ctx: &RunContext, outcome: &LoopOutcome, start: Instant) -> anyhow::Result<()> {
    let elapsed = start.elapsed().as_secs_f64();
    match outcome {
        LoopOutcome::DryRun { prompt } => {
            println!("{prompt}");
            Ok(())
        }
        LoopOutcome::CacheHit { output } => {
            println!(
                "{}Up to date{} {} (cache hit)",
                colors::GREEN,
                colors::RESET,
                output.display()
            );
            Ok(())
        }
        LoopOutcome::Finalized { output, passes } => {
            println!("{}", "─".repeat(50));
            println!(
                "{}Built{} {} in {} pass{} ({:.1}s)",
                colors::GREEN,
                colors::RESET,
                output.display(),
                passes,
                if *passes == 1 { "" } else { "es" },
                elapsed
            );
            Ok(())
        }
        LoopOutcome::Exhausted { passes } => {
            println!("{}", "─".repeat(50));
            anyhow::bail!(
                "gave up on {} after {} passes; nothing was written",
                ctx.output.display(),
                passes
            )
        }
        LoopOutcome::Aborted { passes, .. } => {
            println!("{}", "─".repeat(50));
            anyhow::bail!(
                "aborted {} after {} passes: missing dependencies",
                ctx.output.display(),
                passes
            )
        }
    }
}
