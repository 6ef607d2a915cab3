//! Language profiles: what kiln knows about each generation target.
//!
//! A profile names the file extension of the generated source and the
//! toolchain commands used to check it. Commands are templates where `{src}`
//! stands for the source path and `{out}` for the output path.

mod registry;

pub use registry::{DEFAULT_TARGET, ProfileRegistry};

/// Static description of one generation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageProfile {
    /// Identifier used on the command line (e.g. `cpp`).
    pub id: String,

    /// Human-readable name used in prompts.
    pub display_name: String,

    /// Source file extension without the leading dot.
    pub file_extension: String,

    /// Other extensions of the same language, such as headers.
    pub extra_extensions: Vec<String>,

    /// Command whose exit status tells whether the toolchain is installed.
    pub version_probe_command: Option<String>,

    /// Command that builds `{src}`, writing a binary to `{out}` when the
    /// profile produces one.
    pub build_command: Option<String>,

    /// Whether a successful build leaves a binary at `{out}`.
    pub produces_binary: bool,

    /// Object-only compile used for dependency probing and per-file checks.
    pub check_command: Option<String>,

    /// How a probe source refers to a dependency; `{dep}` is the name.
    pub include_template: Option<String>,
}

impl LanguageProfile {
    /// Whether the toolchain can probe dependencies without linking.
    pub fn supports_preflight(&self) -> bool {
        self.check_command.is_some() && self.include_template.is_some()
    }

    /// Whether the profile is text-only (no verification step).
    pub fn is_asset(&self) -> bool {
        self.build_command.is_none()
    }

    /// Whether files with extension `ext` belong to this language.
    pub fn owns_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.file_extension.eq_ignore_ascii_case(ext)
            || self.extra_extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// File name for a source with this profile's extension.
    pub fn source_file_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.file_extension)
    }
}

/// Expand a command template into program + arguments.
///
/// The template is split on whitespace before substitution so paths with
/// spaces stay a single argument.
pub fn expand_command(template: &str, src: &str, out: &str) -> Vec<String> {
    template
        .split_whitespace()
        .map(|part| part.replace("{src}", src).replace("{out}", out))
        .collect()
}
