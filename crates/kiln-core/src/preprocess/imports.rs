//! Recursive inlining of `IMPORT:` / `INCLUDE:` directives.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::{
    CYCLIC_IMPORT_MARKER, IMPORT_KEYWORDS, MISSING_IMPORT_MARKER, directive_argument, module_end,
    module_start,
};

/// Canonical paths of the documents currently being expanded.
///
/// Lives for exactly one resolution call and is threaded through the
/// recursion explicitly; membership means "importing this again would loop".
#[derive(Debug, Default)]
pub struct ImportStack {
    paths: Vec<PathBuf>,
}

impl ImportStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a document.
    pub fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    /// Leave the most recently entered document.
    pub fn pop(&mut self) -> Option<PathBuf> {
        self.paths.pop()
    }

    /// Whether the document is already being expanded.
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.paths.len()
    }
}

/// Inlines imported documents, wrapping each in module markers.
///
/// Missing and cyclic imports are reported inline with a warning marker and
/// collected so later stages (dependency preflight) can act on them.
#[derive(Debug, Default)]
pub struct ImportResolver {
    missing: Vec<String>,
    cycles: Vec<String>,
}

impl ImportResolver {
    /// Create a new resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a document from disk.
    ///
    /// The document itself is the bottom of the import stack, so a file that
    /// imports itself (directly or transitively) is caught as a cycle.
    pub fn resolve_file(&mut self, path: &Path) -> Result<String> {
        let text = fs::read_to_string(path)?;
        let canonical = path.canonicalize()?;
        let base_dir = canonical.parent().unwrap_or(Path::new(".")).to_path_buf();

        let mut stack = ImportStack::new();
        stack.push(canonical);
        let resolved = self.resolve_text(&text, &base_dir, &mut stack);
        stack.pop();
        resolved
    }

    /// Resolve directive lines in `text`, relative to `base_dir`.
    pub fn resolve_text(
        &mut self,
        text: &str,
        base_dir: &Path,
        stack: &mut ImportStack,
    ) -> Result<String> {
        let mut out = String::with_capacity(text.len());

        for line in text.split_inclusive('\n') {
            let Some(name) = import_target(line) else {
                out.push_str(line);
                continue;
            };
            let ending = line_ending(line);

            let candidate = base_dir.join(name);
            if !candidate.exists() {
                tracing::warn!("Import not found: {} (from {})", name, base_dir.display());
                self.missing.push(name.to_string());
                out.push_str(MISSING_IMPORT_MARKER);
                out.push_str(name);
                out.push_str(ending);
                continue;
            }

            let canonical = candidate.canonicalize()?;
            if stack.contains(&canonical) {
                tracing::warn!("Cyclic import skipped: {}", name);
                self.cycles.push(name.to_string());
                out.push_str(CYCLIC_IMPORT_MARKER);
                out.push_str(name);
                out.push_str(ending);
                continue;
            }

            let nested_text = fs::read_to_string(&canonical)?;
            let nested_base = canonical.parent().unwrap_or(Path::new(".")).to_path_buf();

            tracing::debug!("Inlining {} at depth {}", canonical.display(), stack.depth());
            stack.push(canonical);
            let nested = self.resolve_text(&nested_text, &nested_base, stack);
            stack.pop();
            let nested = nested?;

            out.push_str(&module_start(name));
            out.push('\n');
            out.push_str(&nested);
            if !nested.is_empty() && !nested.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&module_end(name));
            out.push_str(ending);
        }

        Ok(out)
    }

    /// Names of imports whose files did not exist, in encounter order.
    pub fn missing_imports(&self) -> &[String] {
        &self.missing
    }

    /// Names of imports skipped because they would recurse.
    pub fn cyclic_imports(&self) -> &[String] {
        &self.cycles
    }
}

/// Filename named by an import directive line, if the line is one.
fn import_target(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    IMPORT_KEYWORDS
        .iter()
        .find_map(|keyword| trimmed.strip_prefix(keyword))
        .and_then(directive_argument)
}

fn line_ending(line: &str) -> &'static str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_plain_text_passes_through() {
        let temp = TempDir::new().unwrap();
        let main = write(&temp, "main.txt", "line one\n  indented\nno newline");

        let mut resolver = ImportResolver::new();
        let out = resolver.resolve_file(&main).unwrap();
        assert_eq!(out, "line one\n  indented\nno newline");
    }

    #[test]
    fn test_nested_import_relative_to_importer() {
        let temp = TempDir::new().unwrap();
        let main = write(&temp, "main.txt", "top\n  IMPORT: \"lib/a.txt\"\nbottom\n");
        write(&temp, "lib/a.txt", "from a\nINCLUDE: b.txt\n");
        write(&temp, "lib/b.txt", "from b");

        let mut resolver = ImportResolver::new();
        let out = resolver.resolve_file(&main).unwrap();

        let expected = "top\n\
            // ==== MODULE START: lib/a.txt ====\n\
            from a\n\
            // ==== MODULE START: b.txt ====\n\
            from b\n\
            // ==== MODULE END: b.txt ====\n\
            // ==== MODULE END: lib/a.txt ====\n\
            bottom\n";
        assert_eq!(out, expected);
        assert!(resolver.missing_imports().is_empty());
    }

    #[test]
    fn test_missing_import_is_marked_not_fatal() {
        let temp = TempDir::new().unwrap();
        let main = write(&temp, "main.txt", "IMPORT: \"nope.h\"\nrest\n");

        let mut resolver = ImportResolver::new();
        let out = resolver.resolve_file(&main).unwrap();
        assert_eq!(out, "// [WARN] IMPORT NOT FOUND: nope.h\nrest\n");
        assert_eq!(resolver.missing_imports(), ["nope.h".to_string()]);
    }

    #[test]
    fn test_self_import_marks_cycle_once() {
        let temp = TempDir::new().unwrap();
        let lib = write(&temp, "lib.src", "IMPORT: \"other.src\"\n");
        write(&temp, "other.src", "IMPORT: \"lib.src\"\nbody\n");

        let mut resolver = ImportResolver::new();
        let out = resolver.resolve_file(&lib).unwrap();

        assert_eq!(out.matches(CYCLIC_IMPORT_MARKER).count(), 1);
        assert!(out.contains("// [WARN] CYCLIC IMPORT SKIPPED: lib.src"));
        assert!(out.contains("body"));
        assert_eq!(resolver.cyclic_imports().len(), 1);
    }

    #[test]
    fn test_diamond_resolved_per_reference_site() {
        let temp = TempDir::new().unwrap();
        let main = write(&temp, "main.txt", "IMPORT: \"b.txt\"\nIMPORT: \"c.txt\"\n");
        write(&temp, "b.txt", "IMPORT: \"d.txt\"\n");
        write(&temp, "c.txt", "IMPORT: \"d.txt\"\n");
        write(&temp, "d.txt", "shared-body\n");

        let mut resolver = ImportResolver::new();
        let out = resolver.resolve_file(&main).unwrap();

        assert_eq!(out.matches("shared-body").count(), 2);
        assert!(resolver.cyclic_imports().is_empty());
    }

    #[test]
    fn test_empty_file_gives_empty_module_block() {
        let temp = TempDir::new().unwrap();
        let main = write(&temp, "main.txt", "IMPORT: empty.txt\n");
        write(&temp, "empty.txt", "");

        let mut resolver = ImportResolver::new();
        let out = resolver.resolve_file(&main).unwrap();
        assert_eq!(
            out,
            "// ==== MODULE START: empty.txt ====\n// ==== MODULE END: empty.txt ====\n"
        );
    }

    #[test]
    fn test_stack_is_balanced_after_resolution() {
        let temp = TempDir::new().unwrap();
        write(&temp, "a.txt", "IMPORT: b.txt\n");
        write(&temp, "b.txt", "leaf\n");

        let mut resolver = ImportResolver::new();
        let mut stack = ImportStack::new();
        resolver
            .resolve_text("IMPORT: a.txt\n", temp.path(), &mut stack)
            .unwrap();
        assert_eq!(stack.depth(), 0);
    }
}
