//! The built-in profile table and its lookups.

use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

use super::LanguageProfile;

/// Target used when nothing else identifies one.
pub const DEFAULT_TARGET: &str = "cpp";

/// (id, display name, extension, version probe, build, produces binary, check, include)
type Row = (
    &'static str,
    &'static str,
    &'static str,
    Option<&'static str>,
    Option<&'static str>,
    bool,
    Option<&'static str>,
    Option<&'static str>,
);

const BUILTIN: &[Row] = &[
    (
        "c",
        "C",
        "c",
        Some("gcc --version"),
        Some("gcc -O2 {src} -o {out} -lm"),
        true,
        Some("gcc -c {src} -o {out}"),
        Some("#include <{dep}>"),
    ),
    (
        "cpp",
        "C++",
        "cpp",
        Some("g++ --version"),
        Some("g++ -std=c++17 -O2 {src} -o {out}"),
        true,
        Some("g++ -std=c++17 -c {src} -o {out}"),
        Some("#include <{dep}>"),
    ),
    (
        "rust",
        "Rust",
        "rs",
        Some("rustc --version"),
        Some("rustc --edition 2021 -O {src} -o {out}"),
        true,
        None,
        None,
    ),
    (
        "go",
        "Go",
        "go",
        Some("go version"),
        Some("go build -o {out} {src}"),
        true,
        None,
        None,
    ),
    (
        "python",
        "Python",
        "py",
        Some("python3 --version"),
        Some("python3 -m py_compile {src}"),
        false,
        None,
        None,
    ),
    (
        "javascript",
        "JavaScript",
        "js",
        Some("node --version"),
        Some("node --check {src}"),
        false,
        None,
        None,
    ),
    ("html", "HTML", "html", None, None, false, None, None),
    ("svg", "SVG", "svg", None, None, false, None, None),
    ("markdown", "Markdown", "md", None, None, false, None, None),
    ("json", "JSON", "json", None, None, false, None, None),
    ("text", "plain text", "txt", None, None, false, None, None),
];

/// Further extensions per profile. Where two profiles share one (`h`), the
/// earlier profile wins the global extension lookup.
const EXTRA_EXTENSIONS: &[(&str, &[&str])] = &[
    ("c", &["h"]),
    ("cpp", &["cc", "cxx", "h", "hpp", "hh", "hxx"]),
    ("javascript", &["mjs"]),
    ("markdown", &["markdown"]),
    ("html", &["htm"]),
];

/// Registry of language profiles, keyed by id.
///
/// Extensions map back to ids through a secondary index; extra extensions
/// such as `cc` or `hpp` resolve to the canonical profile.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<LanguageProfile>,
    by_id: FxHashMap<String, usize>,
    by_extension: FxHashMap<String, usize>,
}

impl ProfileRegistry {
    /// Registry populated with the built-in profiles.
    pub fn builtin() -> Self {
        let profiles: Vec<LanguageProfile> = BUILTIN
            .iter()
            .map(
                |&(id, display, ext, probe, build, binary, check, include)| LanguageProfile {
                    id: id.to_string(),
                    display_name: display.to_string(),
                    file_extension: ext.to_string(),
                    extra_extensions: EXTRA_EXTENSIONS
                        .iter()
                        .find(|(owner, _)| *owner == id)
                        .map(|(_, extra)| extra.iter().map(|e| e.to_string()).collect())
                        .unwrap_or_default(),
                    version_probe_command: probe.map(str::to_string),
                    build_command: build.map(str::to_string),
                    produces_binary: binary,
                    check_command: check.map(str::to_string),
                    include_template: include.map(str::to_string),
                },
            )
            .collect();

        let mut by_id = FxHashMap::default();
        let mut by_extension = FxHashMap::default();
        for (index, profile) in profiles.iter().enumerate() {
            by_id.insert(profile.id.clone(), index);
            by_extension.insert(profile.file_extension.clone(), index);
        }

        for (index, profile) in profiles.iter().enumerate() {
            for ext in &profile.extra_extensions {
                by_extension.entry(ext.clone()).or_insert(index);
            }
        }

        Self {
            profiles,
            by_id,
            by_extension,
        }
    }

    /// All profiles in table order.
    pub fn profiles(&self) -> &[LanguageProfile] {
        &self.profiles
    }

    /// Look a profile up by its identifier.
    pub fn lookup_by_id(&self, id: &str) -> Result<&LanguageProfile> {
        self.by_id
            .get(&id.to_ascii_lowercase())
            .map(|&index| &self.profiles[index])
            .ok_or_else(|| Error::ProfileNotFound(id.to_string()))
    }

    /// Look a profile up by file extension (leading dot optional).
    pub fn lookup_by_extension(&self, ext: &str) -> Result<&LanguageProfile> {
        let key = ext.trim_start_matches('.').to_ascii_lowercase();
        self.by_extension
            .get(&key)
            .map(|&index| &self.profiles[index])
            .ok_or_else(|| Error::ProfileNotFound(format!(".{key}")))
    }

    /// Look a profile up by the extension of a path.
    pub fn lookup_by_path(&self, path: &Path) -> Option<&LanguageProfile> {
        let ext = path.extension()?.to_str()?;
        self.lookup_by_extension(ext).ok()
    }

    /// Replace the toolchain commands of an existing profile.
    ///
    /// Only commands can be overridden; an unknown id is rejected rather than
    /// creating a new language.
    pub fn apply_override(
        &mut self,
        id: &str,
        build_command: Option<String>,
        version_probe_command: Option<String>,
    ) -> Result<()> {
        let index = *self
            .by_id
            .get(&id.to_ascii_lowercase())
            .ok_or_else(|| Error::Config(format!("override for unknown target '{id}'")))?;

        let profile = &mut self.profiles[index];
        if let Some(build) = build_command {
            tracing::debug!("Overriding build command for {}: {}", profile.id, build);
            profile.build_command = Some(build);
        }
        if let Some(probe) = version_probe_command {
            profile.version_probe_command = Some(probe);
        }
        Ok(())
    }

    /// Pick the target profile for an invocation.
    ///
    /// An explicit id must exist. Without one, the output path's extension is
    /// tried, then the first input's when it names a buildable language, then
    /// [`DEFAULT_TARGET`]. Inputs are prose, so `.md` or `.txt` on an input
    /// never selects an asset target.
    pub fn resolve_target(
        &self,
        explicit: Option<&str>,
        output: Option<&Path>,
        inputs: &[impl AsRef<Path>],
    ) -> Result<&LanguageProfile> {
        if let Some(id) = explicit {
            return self.lookup_by_id(id);
        }

        let from_output = output.and_then(|path| self.lookup_by_path(path));
        let from_input = || {
            inputs
                .first()
                .and_then(|path| self.lookup_by_path(path.as_ref()))
                .filter(|profile| !profile.is_asset())
        };

        match from_output.or_else(from_input) {
            Some(profile) => Ok(profile),
            None => {
                tracing::debug!("No target identified, falling back to {}", DEFAULT_TARGET);
                self.lookup_by_id(DEFAULT_TARGET)
            }
        }
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
