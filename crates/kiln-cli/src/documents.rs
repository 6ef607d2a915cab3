//! Document commands: `kiln resolve` and `kiln split`.
//!
//! Both run the preprocessing stage on its own, without any generation.

use std::fs;
use std::path::{Path, PathBuf};

use kiln_core::aggregate;
use kiln_core::preprocess::{ImportResolver, process_exports};

use crate::colors;

/// Print (or write) the aggregated, import-resolved input.
pub fn resolve(inputs: &[PathBuf], output: Option<&Path>) -> anyhow::Result<()> {
    let context = aggregate(inputs)?;

    match output {
        Some(path) => {
            fs::write(path, context.text())?;
            println!(
                "{}Resolved{} {} documents into {}",
                colors::GREEN,
                colors::RESET,
                context.sources().len(),
                path.display()
            );
        }
        None => print!("{}", context.text()),
    }

    if !context.missing_imports().is_empty() {
        eprintln!(
            "{}warning:{} unresolved imports: {}",
            colors::YELLOW,
            colors::RESET,
            context.missing_imports().join(", ")
        );
    }
    Ok(())
}

/// Split a document's export blocks into files under `out_dir`.
pub fn split(input: &Path, out_dir: &Path) -> anyhow::Result<()> {
    let text = ImportResolver::new().resolve_file(input)?;
    fs::create_dir_all(out_dir)?;
    let report = process_exports(&text, out_dir);

    if !report.has_exports() {
        println!("{}No export blocks found.{}", colors::YELLOW, colors::RESET);
        return Ok(());
    }

    for path in &report.written {
        println!("  {}✓{} {}", colors::GREEN, colors::RESET, path.display());
    }
    for name in &report.failed {
        println!("  {}✗{} {}", colors::RED, colors::RESET, name);
    }

    if report.failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} export targets could not be written", report.failed.len())
    }
}
