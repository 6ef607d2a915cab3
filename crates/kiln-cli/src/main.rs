//! kiln CLI - turns natural-language documents into verified artifacts.

mod build;
mod colors;
mod documents;
mod progress;
mod toolchains;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use kiln_core::WorkDirs;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Generative build orchestrator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and verify an artifact from input documents
    Build(build::BuildArgs),

    /// Print the aggregated input with imports inlined
    Resolve {
        /// Input documents
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Split a document's EXPORT blocks into files
    Split {
        /// Document with export blocks
        input: PathBuf,

        /// Directory to write into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// List target profiles
    Profiles {
        /// Configuration file (default: ./kiln.toml)
        #[arg(long, env = "KILN_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Check that toolchains are installed
    Check {
        /// Target profile id (default: all)
        target: Option<String>,

        /// Configuration file (default: ./kiln.toml)
        #[arg(long, env = "KILN_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Remove temporary artifacts and cache records
    Clean {
        /// Directory holding the .kiln folder
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Helper to format kiln-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(kiln_err) = err.downcast_ref::<kiln_core::Error>() {
            anyhow::anyhow!("{}", kiln_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Build(args) => build::execute(args).map_err(format_error)?,

        Commands::Resolve { inputs, output } => {
            documents::resolve(&inputs, output.as_deref()).map_err(format_error)?;
        }

        Commands::Split { input, output } => {
            documents::split(&input, &output).map_err(format_error)?;
        }

        Commands::Profiles { config } => {
            toolchains::list(config.as_deref()).map_err(format_error)?;
        }

        Commands::Check { target, config } => {
            toolchains::check(target.as_deref(), config.as_deref()).map_err(format_error)?;
        }

        Commands::Clean { dir } => clean(&dir).map_err(format_error)?,
    }

    Ok(())
}

/// Empty the `.kiln` directory under `dir`.
fn clean(dir: &Path) -> anyhow::Result<()> {
    let kiln_dir = dir.join(".kiln");
    if !kiln_dir.exists() {
        println!("Nothing to clean in {}", dir.display());
        return Ok(());
    }

    WorkDirs::in_dir(dir)?.clean()?;
    println!(
        "{}Cleaned{} {}",
        colors::GREEN,
        colors::RESET,
        kiln_dir.display()
    );
    Ok(())
}
