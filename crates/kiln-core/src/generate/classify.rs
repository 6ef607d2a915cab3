//! Classification of failed builds.
//!
//! Compiler output is free-form text, so classification is a set of substring
//! heuristics. They live in one ordered table so they can be read, tested and
//! tuned without touching the loop.

use crate::profile::LanguageProfile;

/// What a failed build most likely means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Something the program needs is not installed; retrying won't help.
    DependencyFatal,
    /// The generated code wraps another language's runtime instead of
    /// translating it.
    LazyTranslation,
    /// Anything else; the raw output goes back to the service.
    GenericBuildError,
}

/// What a rule gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    /// Combined build output.
    pub output: &'a str,
    /// The code that was built.
    pub code: &'a str,
    /// Profile it was built with.
    pub profile: &'a LanguageProfile,
}

/// One entry of the classification table.
pub struct Rule {
    pub kind: ErrorKind,
    pub description: &'static str,
    pub matches: fn(&RuleInput<'_>) -> bool,
}

/// Missing file, header or module indicators.
const MISSING_DEPENDENCY_PATTERNS: &[&str] = &[
    "No such file or directory",
    "file not found",
    "ModuleNotFoundError",
    "No module named",
    "cannot find -l",
    "unresolved import",
    "could not find module",
    "cannot find package",
];

/// Signs of a native wrapper around a foreign runtime.
const WRAPPER_MARKERS: &[&str] = &["Python.h", "pybind11", "jni.h", "node_api.h", "PyObject"];

fn wraps_foreign_runtime(input: &RuleInput<'_>) -> bool {
    WRAPPER_MARKERS
        .iter()
        .any(|marker| input.code.contains(marker) || input.output.contains(marker))
}

fn missing_dependency(input: &RuleInput<'_>) -> bool {
    // A missing Python.h is the symptom of a wrapper, not a missing library.
    MISSING_DEPENDENCY_PATTERNS.iter().any(|p| input.output.contains(p)) && !wraps_foreign_runtime(input)
}

/// Ordered rules; the first match wins, no match is a generic build error.
pub const CLASSIFICATION_RULES: &[Rule] = &[
    Rule {
        kind: ErrorKind::DependencyFatal,
        description: "missing file, header or module",
        matches: missing_dependency,
    },
    Rule {
        kind: ErrorKind::LazyTranslation,
        description: "native wrapper around another language's runtime",
        matches: wraps_foreign_runtime,
    },
];

/// Classify a failed build.
pub fn classify(input: &RuleInput<'_>) -> ErrorKind {
    CLASSIFICATION_RULES
        .iter()
        .find(|rule| (rule.matches)(input))
        .map(|rule| {
            tracing::debug!("Build failure classified as {}", rule.description);
            rule.kind
        })
        .unwrap_or(ErrorKind::GenericBuildError)
}

/// Instruction put into the error history in place of the raw output of a
/// lazy translation.
pub fn corrective_instruction(profile: &LanguageProfile) -> String {
    format!(
        "The previous attempt embedded or wrapped another language's runtime (for example \
         Python.h, pybind11, JNI or N-API) instead of translating the logic. Rewrite it as \
         plain, native {} using only its standard library. Do not include any interpreter \
         or foreign-runtime headers.",
        profile.display_name
    )
}
