//! Toolchain boundary: version probes and builds as subprocesses.
//!
//! The generation loop only cares about exit codes and the combined output
//! text, so everything a compiler says ends up in one string.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{Error, Result};
use crate::profile::{LanguageProfile, expand_command};

/// Result of running a build or check command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Process exit code (`-1` when killed by a signal).
    pub exit_code: i32,

    /// stdout followed by stderr.
    pub output: String,
}

impl BuildOutput {
    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Something that can probe for and run compilers.
pub trait Toolchain {
    /// Run a version probe command, returning its exit code.
    fn probe(&self, command: &str) -> Result<i32>;

    /// Run a build command template against `src`, writing to `out`.
    fn build(&self, command: &str, src: &Path, out: &Path) -> Result<BuildOutput>;
}

/// Toolchain backed by programs on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct SystemToolchain;

impl SystemToolchain {
    /// Create a new system toolchain.
    pub fn new() -> Self {
        Self
    }

    fn command(argv: &[String]) -> Result<Command> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Toolchain("empty command".to_string()))?;

        let resolved = which::which(program)
            .map_err(|_| Error::Toolchain(format!("{program} not found in PATH")))?;

        let mut cmd = Command::new(resolved);
        cmd.args(args);
        Ok(cmd)
    }
}

impl Toolchain for SystemToolchain {
    fn probe(&self, command: &str) -> Result<i32> {
        let argv = expand_command(command, "", "");
        let status = Self::command(&argv)?
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| Error::Toolchain(format!("failed to run `{command}`: {e}")))?;

        Ok(status.code().unwrap_or(-1))
    }

    fn build(&self, command: &str, src: &Path, out: &Path) -> Result<BuildOutput> {
        let argv = expand_command(
            command,
            &src.to_string_lossy(),
            &out.to_string_lossy(),
        );
        tracing::debug!("Running: {}", argv.join(" "));

        let output = Self::command(&argv)?
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::Toolchain(format!("failed to run `{}`: {}", argv[0], e)))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(BuildOutput {
            exit_code: output.status.code().unwrap_or(-1),
            output: text,
        })
    }
}

/// Make sure the profile's toolchain is installed.
///
/// Profiles without a build command (assets) need no toolchain. A profile
/// with a build command but no probe is trusted.
pub fn ensure_available(toolchain: &dyn Toolchain, profile: &LanguageProfile) -> Result<()> {
    if profile.is_asset() {
        return Ok(());
    }
    let Some(probe) = profile.version_probe_command.as_deref() else {
        return Ok(());
    };

    match toolchain.probe(probe)? {
        0 => Ok(()),
        code => Err(Error::Toolchain(format!(
            "{} toolchain probe `{}` exited with {}",
            profile.display_name, probe, code
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileRegistry;

    struct FixedProbe(i32);

    impl Toolchain for FixedProbe {
        fn probe(&self, _command: &str) -> Result<i32> {
            Ok(self.0)
        }

        fn build(&self, _command: &str, _src: &Path, _out: &Path) -> Result<BuildOutput> {
            unreachable!("probe-only toolchain")
        }
    }

    #[test]
    fn test_missing_program_is_toolchain_error() {
        let toolchain = SystemToolchain::new();
        let result = toolchain.probe("definitely-not-a-real-compiler-kiln --version");
        assert!(matches!(result, Err(Error::Toolchain(_))));
    }

    #[test]
    fn test_ensure_available_reports_probe_failure() {
        let registry = ProfileRegistry::builtin();
        let cpp = registry.lookup_by_id("cpp").unwrap();

        assert!(ensure_available(&FixedProbe(0), cpp).is_ok());
        assert!(matches!(ensure_available(&FixedProbe(127), cpp), Err(Error::Toolchain(_))));
    }

    #[test]
    fn test_assets_need_no_toolchain() {
        let registry = ProfileRegistry::builtin();
        let svg = registry.lookup_by_id("svg").unwrap();
        assert!(ensure_available(&FixedProbe(1), svg).is_ok());
    }
}
