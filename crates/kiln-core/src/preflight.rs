//! Dependency preflight: a cheap compile probe before an expensive generation.
//!
//! The probe includes every dependency the input mentions and compiles it
//! object-only. Passing does not guarantee the final link succeeds; failing
//! means generating would be wasted money.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::preprocess::{AggregatedContext, MISSING_IMPORT_MARKER};
use crate::profile::LanguageProfile;
use crate::toolchain::Toolchain;

/// Outcome of a preflight probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreflightOutcome {
    /// Every dependency compiled.
    Passed,
    /// Nothing to check: unsupported profile or no dependencies.
    Skipped,
    /// The probe failed; `missing` are the dependencies the tool mentioned.
    Failed { missing: Vec<String> },
}

/// Collect dependency names mentioned by the aggregated input.
///
/// Sources are unresolved-import warnings and native `#include` directives.
/// Names are deduplicated, keeping first-seen order.
pub fn collect_dependencies(context: &AggregatedContext) -> Vec<String> {
    let mut deps: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        let name = name.trim();
        if !name.is_empty() && !deps.iter().any(|d| d == name) {
            deps.push(name.to_string());
        }
    };

    for name in context.missing_imports() {
        push(name);
    }

    for line in context.text().lines() {
        let trimmed = line.trim_start();
        if let Some(name) = trimmed.strip_prefix(MISSING_IMPORT_MARKER) {
            push(name);
        } else if let Some(name) = include_target(trimmed) {
            push(name);
        }
    }

    deps
}

/// Name inside `#include <name>` or `#include "name"`.
fn include_target(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('#')?.trim_start().strip_prefix("include")?.trim_start();
    let (open, close) = match rest.chars().next()? {
        '<' => ('<', '>'),
        '"' => ('"', '"'),
        _ => return None,
    };
    let inner = rest.strip_prefix(open)?;
    let end = inner.find(close)?;
    Some(&inner[..end])
}

/// Build the probe source for `deps`.
pub fn synthesize_probe(profile: &LanguageProfile, deps: &[String]) -> Option<String> {
    let template = profile.include_template.as_deref()?;
    let mut source: String = deps
        .iter()
        .map(|dep| format!("{}\n", template.replace("{dep}", dep)))
        .collect();
    source.push_str("int kiln_preflight_anchor;\n");
    Some(source)
}

/// Runs dependency probes for one profile.
pub struct DependencyPreflightChecker<'a> {
    toolchain: &'a dyn Toolchain,
    profile: &'a LanguageProfile,
}

impl<'a> DependencyPreflightChecker<'a> {
    /// Create a checker for `profile`.
    pub fn new(toolchain: &'a dyn Toolchain, profile: &'a LanguageProfile) -> Self {
        Self { toolchain, profile }
    }

    /// Probe `deps`, using `work_dir` for the probe source and object file.
    pub fn check(&self, deps: &[String], work_dir: &Path) -> Result<PreflightOutcome> {
        let Some(check) = self.profile.check_command.as_deref() else {
            return Ok(PreflightOutcome::Skipped);
        };
        if deps.is_empty() {
            return Ok(PreflightOutcome::Skipped);
        }
        let Some(source) = synthesize_probe(self.profile, deps) else {
            return Ok(PreflightOutcome::Skipped);
        };

        fs::create_dir_all(work_dir)?;
        let src = work_dir.join(self.profile.source_file_name("preflight"));
        let obj = work_dir.join("preflight.o");
        fs::write(&src, source)?;

        tracing::info!("Preflight: probing {} dependencies", deps.len());
        let result = self.toolchain.build(check, &src, &obj);

        let _ = fs::remove_file(&src);
        let _ = fs::remove_file(&obj);
        let result = result?;

        if result.success() {
            return Ok(PreflightOutcome::Passed);
        }

        let mut missing: Vec<String> = deps
            .iter()
            .filter(|dep| result.output.contains(dep.as_str()))
            .cloned()
            .collect();
        if missing.is_empty() {
            missing = deps.to_vec();
        }
        tracing::warn!("Preflight failed for: {}", missing.join(", "));
        Ok(PreflightOutcome::Failed { missing })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::profile::ProfileRegistry;
    use crate::toolchain::BuildOutput;
    use tempfile::TempDir;

    struct RecordingToolchain {
        exit_code: i32,
        output: String,
        seen_source: RefCell<Option<String>>,
    }

    impl Toolchain for RecordingToolchain {
        fn probe(&self, _command: &str) -> Result<i32> {
            Ok(0)
        }

        fn build(&self, _command: &str, src: &Path, _out: &Path) -> Result<BuildOutput> {
            *self.seen_source.borrow_mut() = Some(fs::read_to_string(src)?);
            Ok(BuildOutput {
                exit_code: self.exit_code,
                output: self.output.clone(),
            })
        }
    }

    fn toolchain(exit_code: i32, output: &str) -> RecordingToolchain {
        RecordingToolchain {
            exit_code,
            output: output.to_string(),
            seen_source: RefCell::new(None),
        }
    }

    #[test]
    fn test_collect_from_includes_and_missing_imports() {
        let ctx = AggregatedContext::from_text(
            "#include <stdio.h>\n  # include \"mylib.h\"\n// [WARN] IMPORT NOT FOUND: gone.h\n#include <stdio.h>\n#define X 1\n",
        );
        assert_eq!(collect_dependencies(&ctx), vec!["stdio.h", "mylib.h", "gone.h"]);
    }

    #[test]
    fn test_probe_source_lists_each_dependency() {
        let registry = ProfileRegistry::builtin();
        let c = registry.lookup_by_id("c").unwrap();
        let probe = synthesize_probe(c, &["a.h".to_string(), "b.h".to_string()]).unwrap();
        assert_eq!(probe, "#include <a.h>\n#include <b.h>\nint kiln_preflight_anchor;\n");
    }

    #[test]
    fn test_failure_names_implicated_dependencies() {
        let temp = TempDir::new().unwrap();
        let registry = ProfileRegistry::builtin();
        let cpp = registry.lookup_by_id("cpp").unwrap();
        let tc = toolchain(1, "preflight.cpp:2:10: fatal error: foo.h: No such file or directory");

        let deps = vec!["vector".to_string(), "foo.h".to_string()];
        let outcome = DependencyPreflightChecker::new(&tc, cpp)
            .check(&deps, temp.path())
            .unwrap();

        assert_eq!(outcome, PreflightOutcome::Failed { missing: vec!["foo.h".to_string()] });
        assert!(tc.seen_source.borrow().as_deref().unwrap().contains("#include <foo.h>"));
        assert!(!temp.path().join("preflight.cpp").exists());
    }

    #[test]
    fn test_unmatched_failure_implicates_everything() {
        let temp = TempDir::new().unwrap();
        let registry = ProfileRegistry::builtin();
        let c = registry.lookup_by_id("c").unwrap();
        let tc = toolchain(1, "internal compiler error");

        let deps = vec!["x.h".to_string()];
        let outcome = DependencyPreflightChecker::new(&tc, c).check(&deps, temp.path()).unwrap();
        assert_eq!(outcome, PreflightOutcome::Failed { missing: deps });
    }

    #[test]
    fn test_skipped_for_unsupported_profiles_and_no_deps() {
        let temp = TempDir::new().unwrap();
        let registry = ProfileRegistry::builtin();
        let tc = toolchain(0, "");

        let rust = registry.lookup_by_id("rust").unwrap();
        let deps = vec!["serde".to_string()];
        assert_eq!(
            DependencyPreflightChecker::new(&tc, rust).check(&deps, temp.path()).unwrap(),
            PreflightOutcome::Skipped
        );

        let c = registry.lookup_by_id("c").unwrap();
        assert_eq!(
            DependencyPreflightChecker::new(&tc, c).check(&[], temp.path()).unwrap(),
            PreflightOutcome::Skipped
        );
        assert!(tc.seen_source.borrow().is_none());
    }

    #[test]
    fn test_passing_probe() {
        let temp = TempDir::new().unwrap();
        let registry = ProfileRegistry::builtin();
        let c = registry.lookup_by_id("c").unwrap();
        let tc = toolchain(0, "");
        let deps = vec!["math.h".to_string()];
        assert_eq!(
            DependencyPreflightChecker::new(&tc, c).check(&deps, temp.path()).unwrap(),
            PreflightOutcome::Passed
        );
    }

    struct UnlaunchableToolchain;

    impl Toolchain for UnlaunchableToolchain {
        fn probe(&self, _command: &str) -> Result<i32> {
            Ok(0)
        }

        fn build(&self, _command: &str, _src: &Path, _out: &Path) -> Result<BuildOutput> {
            Err(crate::Error::Io(std::io::Error::other("exec format error")))
        }
    }

    #[test]
    fn test_launch_failure_still_removes_probe_source() {
        let temp = TempDir::new().unwrap();
        let registry = ProfileRegistry::builtin();
        let c = registry.lookup_by_id("c").unwrap();
        let deps = vec!["zlib.h".to_string()];

        let result = DependencyPreflightChecker::new(&UnlaunchableToolchain, c).check(&deps, temp.path());

        assert!(result.is_err());
        assert!(!temp.path().join("preflight.c").exists());
    }
}
