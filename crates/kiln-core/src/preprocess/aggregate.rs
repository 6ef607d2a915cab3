//! Aggregation of all input documents into one resolved context.

use std::path::{Path, PathBuf};

use crate::error::Result;

use super::imports::ImportResolver;
use super::{file_end, file_start};

/// Fully resolved text of every input document.
///
/// Built once per invocation and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct AggregatedContext {
    text: String,
    sources: Vec<PathBuf>,
    missing_imports: Vec<String>,
}

impl AggregatedContext {
    /// Build a context from already-resolved text (no files involved).
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// The aggregated text with file markers.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Input documents in the order they were aggregated.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Imports that named files which do not exist.
    pub fn missing_imports(&self) -> &[String] {
        &self.missing_imports
    }

    /// Whether there is any content at all.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Resolve each input document and concatenate them between file markers.
pub fn aggregate(inputs: &[impl AsRef<Path>]) -> Result<AggregatedContext> {
    let mut resolver = ImportResolver::new();
    let mut text = String::new();
    let mut sources = Vec::with_capacity(inputs.len());

    for input in inputs {
        let path = input.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        tracing::debug!("Aggregating {}", path.display());
        let resolved = resolver.resolve_file(path)?;

        text.push_str(&file_start(&name));
        text.push('\n');
        text.push_str(&resolved);
        if !resolved.is_empty() && !resolved.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&file_end(&name));
        text.push('\n');

        sources.push(path.to_path_buf());
    }

    Ok(AggregatedContext {
        text,
        sources,
        missing_imports: resolver.missing_imports().to_vec(),
    })
}
