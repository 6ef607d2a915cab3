//! Error types for kiln-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for kiln-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in kiln-core.
///
/// Everything the generation loop can recover from (transport hiccups,
/// malformed responses, failing builds) is handled inside the loop and never
/// shows up here. What remains are failures that stop an invocation outright.
#[derive(Debug, Error)]
pub enum Error {
    /// No language profile matches the requested id or extension.
    #[error("unknown target: {0}")]
    ProfileNotFound(String),

    /// Configuration file could not be parsed or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Toolchain is missing or could not be invoked.
    #[error("toolchain error: {0}")]
    Toolchain(String),

    /// Dependency preflight probe failed before any generation.
    #[error("preflight failed, missing dependencies: {}", missing.join(", "))]
    Preflight { missing: Vec<String> },

    /// Relocating the finished artifact failed after all retries.
    ///
    /// The temporary artifact is left in place for manual recovery.
    #[error("failed to finalize {} (artifact kept at {}): {message}", output.display(), temp.display())]
    Finalize {
        temp: PathBuf,
        output: PathBuf,
        message: String,
    },

    /// Generation service could not be reached or configured.
    #[error("generation service error: {0}")]
    Service(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Render the error together with a recovery hint, if one applies.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Error::ProfileNotFound(_) => Some("run `kiln profiles` to list the available targets"),
            Error::Toolchain(_) => {
                Some("install the toolchain or override its commands under [toolchains.<id>] in kiln.toml")
            }
            Error::Preflight { .. } => {
                Some("install the missing dependencies, or pass --skip-preflight to generate anyway")
            }
            Error::Finalize { .. } => {
                Some("another process may hold the output file; move the kept artifact by hand")
            }
            Error::Service(_) => Some("check the [provider] section of kiln.toml and the API key variable"),
            Error::Config(_) | Error::Io(_) => None,
        };

        match hint {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preflight_message_lists_names() {
        let err = Error::Preflight {
            missing: vec!["foo.h".to_string(), "bar.h".to_string()],
        };
        assert_eq!(err.to_string(), "preflight failed, missing dependencies: foo.h, bar.h");
        assert!(err.with_hint().contains("--skip-preflight"));
    }

    #[test]
    fn test_io_has_no_hint() {
        let err = Error::Io(std::io::Error::other("disk full"));
        assert!(!err.with_hint().contains("hint"));
    }
}
