//! Moving verified artifacts to where the user asked for them.
//!
//! The destination may be briefly locked (a running binary on Windows, an
//! editor, a virus scanner), so every move is retried a bounded number of
//! times. When all attempts fail the temporary artifact stays where it is and
//! the error names it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// Temp file next to `dest`, so the final step is a same-directory rename.
fn sibling_of(dest: &Path) -> PathBuf {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    dest.with_file_name(format!(".{file_name}.kiln-tmp"))
}

fn create_parent(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Copy `from` over `dest` without ever exposing a partial file at `dest`.
fn copy_into_place(from: &Path, dest: &Path) -> io::Result<()> {
    let sibling = sibling_of(dest);
    let result = fs::copy(from, &sibling).and_then(|_| fs::rename(&sibling, dest));
    if result.is_err() {
        let _ = fs::remove_file(&sibling);
    }
    result
}

fn move_once(temp: &Path, dest: &Path) -> io::Result<()> {
    create_parent(dest)?;

    match fs::rename(temp, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_into_place(temp, dest)?;
            fs::remove_file(temp)
        }
        Err(e) => Err(e),
    }
}

/// Move `temp` to `dest`, retrying up to `attempts` times.
pub fn relocate(temp: &Path, dest: &Path, attempts: u32, backoff: Duration) -> Result<()> {
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match move_once(temp, dest) {
            Ok(()) => {
                tracing::debug!("Moved {} to {}", temp.display(), dest.display());
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(
                    "Could not move artifact to {} (attempt {}/{}): {}",
                    dest.display(),
                    attempt,
                    attempts,
                    e
                );
                last_error = Some(e);
                if attempt < attempts {
                    thread::sleep(backoff);
                }
            }
        }
    }

    Err(Error::Finalize {
        temp: temp.to_path_buf(),
        output: dest.to_path_buf(),
        message: last_error.map(|e| e.to_string()).unwrap_or_default(),
    })
}

/// Copy `staged` to `dest` through a sibling temp file, leaving `staged`
/// in place.
///
/// Used for multi-file projects whose staged files must stay visible to
/// later per-file checks.
pub fn install_copy(staged: &Path, dest: &Path, attempts: u32, backoff: Duration) -> Result<()> {
    let sibling = sibling_of(dest);
    create_parent(&sibling)?;
    if let Err(e) = fs::copy(staged, &sibling) {
        let _ = fs::remove_file(&sibling);
        return Err(e.into());
    }
    relocate(&sibling, dest, attempts, backoff)
}
