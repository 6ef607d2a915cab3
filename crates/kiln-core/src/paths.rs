//! Working directory management.
//!
//! Keeps temporary artifacts and cache records in one place next to the
//! requested output, so the same paths are used by every component.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Directory structure for one output artifact.
///
/// ```text
/// app            # requested output
/// .kiln/
/// ├── build/     # pending sources, temp binaries, preflight probes, export staging
/// └── cache/     # cache records (<output name>.sha256)
/// ```
#[derive(Debug, Clone)]
pub struct WorkDirs {
    /// The `.kiln` directory itself.
    pub kiln_dir: PathBuf,

    /// Temporary artifacts of in-flight attempts.
    pub build_dir: PathBuf,

    /// Cache records.
    pub cache_dir: PathBuf,
}

impl WorkDirs {
    /// Directory structure next to an output path.
    ///
    /// Creates all necessary directories if they don't exist.
    pub fn for_output(output: &Path) -> Result<Self> {
        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        Self::in_dir(parent)
    }

    /// Directory structure inside `dir`.
    pub fn in_dir(dir: &Path) -> Result<Self> {
        let kiln_dir = dir.join(".kiln");
        let build_dir = kiln_dir.join("build");
        let cache_dir = kiln_dir.join("cache");

        fs::create_dir_all(&build_dir)?;
        fs::create_dir_all(&cache_dir)?;

        Ok(Self {
            kiln_dir,
            build_dir,
            cache_dir,
        })
    }

    /// Temporary source path for a file extension.
    pub fn pending_source(&self, extension: &str) -> PathBuf {
        self.build_dir.join(format!("pending.{extension}"))
    }

    /// Temporary binary path.
    pub fn pending_binary(&self) -> PathBuf {
        #[cfg(target_os = "windows")]
        let name = "pending.exe";

        #[cfg(not(target_os = "windows"))]
        let name = "pending.bin";

        self.build_dir.join(name)
    }

    /// Staging area for multi-file projects.
    pub fn project_dir(&self) -> PathBuf {
        self.build_dir.join("project")
    }

    /// Remove every temporary artifact and cache record.
    ///
    /// Removes the entire `.kiln` directory and recreates it.
    pub fn clean(&self) -> Result<()> {
        if self.kiln_dir.exists() {
            fs::remove_dir_all(&self.kiln_dir)?;
        }

        fs::create_dir_all(&self.build_dir)?;
        fs::create_dir_all(&self.cache_dir)?;

        Ok(())
    }
}
