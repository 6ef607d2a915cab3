//! Text preprocessing for input documents and generated output.
//!
//! # Architecture
//!
//! ```text
//! input documents
//!     │
//!     ├── ImportResolver ──► IMPORT:/INCLUDE: lines inlined (cycle-guarded)
//!     │
//!     └── aggregate() ──► AggregatedContext (FILE START/END markers)
//!                              │
//!                              ├── parse_blueprint() ──► Vec<BlueprintEntry>
//!                              │
//!                              └── prompt ──► generation ──► process_exports() ──► files
//! ```
//!
//! All directive and marker syntax lives in this module so the prompt side and
//! the parsing side agree on it.

mod aggregate;
mod exports;
mod imports;
mod template;

pub use aggregate::{AggregatedContext, aggregate};
pub use exports::{BlueprintEntry, ExportReport, parse_blueprint, process_exports};
pub(crate) use exports::is_contained;
pub use imports::{ImportResolver, ImportStack};
pub use template::TemplateStripper;

/// Directive keywords that inline another document.
pub const IMPORT_KEYWORDS: [&str; 2] = ["IMPORT:", "INCLUDE:"];

/// Directive keyword that starts (or, followed by `END`, closes) an export block.
pub const EXPORT_KEYWORD: &str = "EXPORT:";

/// Opening token of an embedded natural-language instruction.
pub const TEMPLATE_OPEN: &str = "$${";

/// Closing token of an embedded natural-language instruction.
pub const TEMPLATE_CLOSE: &str = "}$$";

/// Marker emitted in place of an import whose file does not exist.
pub const MISSING_IMPORT_MARKER: &str = "// [WARN] IMPORT NOT FOUND: ";

/// Marker emitted in place of an import that would recurse into itself.
pub const CYCLIC_IMPORT_MARKER: &str = "// [WARN] CYCLIC IMPORT SKIPPED: ";

pub(crate) fn module_start(name: &str) -> String {
    format!("// ==== MODULE START: {name} ====")
}

pub(crate) fn module_end(name: &str) -> String {
    format!("// ==== MODULE END: {name} ====")
}

pub(crate) fn file_start(name: &str) -> String {
    format!("// ==== FILE START: {name} ====")
}

pub(crate) fn file_end(name: &str) -> String {
    format!("// ==== FILE END: {name} ====")
}

/// Extract the filename argument of a directive.
///
/// Takes the first quoted substring when the quotes balance, otherwise the
/// first whitespace-delimited token with stray quotes trimmed off both ends.
pub(crate) fn directive_argument(rest: &str) -> Option<&str> {
    let rest = rest.trim();

    if let Some(open) = rest.find('"') {
        let after = &rest[open + 1..];
        if let Some(close) = after.find('"') {
            let name = after[..close].trim();
            return (!name.is_empty()).then_some(name);
        }
    }

    let token = rest.split_whitespace().next()?;
    let name = token.trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace());
    (!name.is_empty()).then_some(name)
}
