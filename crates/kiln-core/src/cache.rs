//! Content-hash build cache.
//!
//! A successful build leaves a single SHA-256 hex digest in
//! `.kiln/cache/<output file name>.sha256`. The next invocation recomputes the
//! digest and skips generation entirely when nothing relevant changed and the
//! output is still on disk.
//!
//! The record is only a hint: a record that cannot be read or does not look
//! like a digest is a cache miss, never an error.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Bumped whenever the hash encoding changes, so old records miss.
const CACHE_FORMAT: &str = "kiln-cache-v1";

/// Everything that decides whether a previous artifact is still valid.
#[derive(Debug, Clone, Copy)]
pub struct CacheKey<'a> {
    /// Aggregated, import-resolved input text.
    pub resolved_input: &'a str,
    /// Target profile id.
    pub profile_id: &'a str,
    /// Identity of the generation service (provider + model).
    pub model_id: &'a str,
    /// Whether the run updates an existing artifact.
    pub update_mode: bool,
    /// Generation mode name (transpile, architect, asset).
    pub generation_mode: &'a str,
}

impl CacheKey<'_> {
    /// Deterministic digest of the key, as lowercase hex.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            CACHE_FORMAT,
            self.resolved_input,
            self.profile_id,
            self.model_id,
            if self.update_mode { "update" } else { "fresh" },
            self.generation_mode,
        ] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// The cache record for one output artifact.
#[derive(Debug, Clone)]
pub struct BuildCache {
    record_path: PathBuf,
}

impl BuildCache {
    /// Cache record for `output`, stored under `cache_dir`.
    pub fn for_output(cache_dir: &Path, output: &Path) -> Self {
        let name = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        Self {
            record_path: cache_dir.join(format!("{name}.sha256")),
        }
    }

    /// Path of the record file.
    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    /// The stored digest, if there is a well-formed one.
    pub fn load(&self) -> Option<String> {
        let raw = match fs::read_to_string(&self.record_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache record {}: {}", self.record_path.display(), e);
                return None;
            }
        };

        let digest = raw.trim();
        if digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(digest.to_ascii_lowercase())
        } else {
            tracing::warn!("Ignoring corrupt cache record {}", self.record_path.display());
            None
        }
    }

    /// Whether generation can be skipped.
    ///
    /// Requires both a matching record and an output that still exists; a
    /// deleted output always forces regeneration.
    pub fn should_skip(&self, digest: &str, output_exists: bool) -> bool {
        if !output_exists {
            return false;
        }
        self.load().is_some_and(|stored| stored == digest)
    }

    /// Persist `digest` as the record for the current artifact.
    pub fn record(&self, digest: &str) -> Result<()> {
        if let Some(parent) = self.record_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp = self.record_path.with_extension("sha256.tmp");
        fs::write(&temp, digest)?;
        fs::rename(&temp, &self.record_path)?;
        tracing::debug!("Recorded cache digest in {}", self.record_path.display());
        Ok(())
    }

    /// Remove the record, if any.
    pub fn invalidate(&self) -> Result<()> {
        match fs::remove_file(&self.record_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
