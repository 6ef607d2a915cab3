//! Export directives: splitting generated text into files, and reading
//! blueprints out of input documents.
//!
//! ```text
//! EXPORT: "src/main.cpp" // optional same-line content
//! ...lines of the file...
//! EXPORT: END
//! ```
//!
//! A block also ends at the next export header or at the end of the text.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use super::template::{TemplateStripper, split_ending};
use super::{EXPORT_KEYWORD, directive_argument};

/// One named file of a multi-file blueprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlueprintEntry {
    /// Target filename, relative to the output directory.
    pub filename: String,
    /// Block content with template spans removed.
    pub content: String,
}

/// Outcome of streaming a document into export files.
#[derive(Debug, Default)]
pub struct ExportReport {
    /// Text that fell outside every export block.
    pub residual: String,
    /// Files written, in the order they were first opened.
    pub written: Vec<PathBuf>,
    /// Export targets that could not be opened or written.
    pub failed: Vec<String>,
}

impl ExportReport {
    /// Whether any export header was seen.
    pub fn has_exports(&self) -> bool {
        !self.written.is_empty() || !self.failed.is_empty()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ExportHeader<'a> {
    Start { filename: &'a str, trailing: &'a str },
    End,
}

/// Parse an export header line, if the line is one.
fn parse_header(line: &str) -> Option<ExportHeader<'_>> {
    let rest = line.trim_start().strip_prefix(EXPORT_KEYWORD)?.trim_start();

    if rest.trim_end() == "END" {
        return Some(ExportHeader::End);
    }

    if let Some(quoted) = rest.strip_prefix('"') {
        if let Some(close) = quoted.find('"') {
            let filename = quoted[..close].trim();
            if filename.is_empty() {
                return None;
            }
            let trailing = quoted[close + 1..].trim_start();
            return Some(ExportHeader::Start { filename, trailing });
        }
    }

    let filename = directive_argument(rest)?;
    let trailing = rest
        .split_once(char::is_whitespace)
        .map(|(_, after)| after.trim_start())
        .unwrap_or("");
    Some(ExportHeader::Start { filename, trailing })
}

/// Whether an export filename stays inside the base directory.
pub(crate) fn is_contained(filename: &str) -> bool {
    let path = Path::new(filename);
    !path.is_absolute()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Where the lines of the current block go.
enum Sink {
    /// Outside any block: lines become residual text.
    Residual,
    /// Inside a block whose file is open.
    File {
        name: String,
        writer: BufWriter<File>,
    },
    /// Inside a block whose file could not be opened; lines are dropped.
    Discard,
}

/// Stream `text` into files under `base_path`, one per export block.
///
/// A target that cannot be opened (or written) is reported once, and the rest
/// of that block is discarded; the next header starts fresh.
pub fn process_exports(text: &str, base_path: &Path) -> ExportReport {
    let mut report = ExportReport::default();
    let mut sink = Sink::Residual;
    let mut stripper = TemplateStripper::new();

    for line in text.split_inclusive('\n') {
        let (body, ending) = split_ending(line);

        if let Some(header) = parse_header(body) {
            close_sink(sink, &mut report);
            if stripper.is_inside() {
                tracing::warn!("Template span left open before export header");
            }
            stripper = TemplateStripper::new();

            sink = match header {
                ExportHeader::End => Sink::Residual,
                ExportHeader::Start { filename, trailing } => {
                    let mut next = open_target(base_path, filename, &mut report);
                    if !trailing.is_empty() {
                        if let Some(kept) = stripper.strip_line(trailing) {
                            next = write_line(next, &kept, ending, &mut report);
                        }
                    }
                    next
                }
            };
            continue;
        }

        let Some(kept) = stripper.strip_line(body) else {
            continue;
        };

        sink = match sink {
            Sink::Residual => {
                report.residual.push_str(&kept);
                report.residual.push_str(ending);
                Sink::Residual
            }
            other => write_line(other, &kept, ending, &mut report),
        };
    }

    close_sink(sink, &mut report);
    report
}

fn open_target(base_path: &Path, filename: &str, report: &mut ExportReport) -> Sink {
    if !is_contained(filename) {
        tracing::warn!("Refusing export outside the output directory: {}", filename);
        report.failed.push(filename.to_string());
        return Sink::Discard;
    }

    let path = base_path.join(filename);
    let append = report.written.contains(&path);

    let opened = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| {
            OpenOptions::new()
                .write(true)
                .create(true)
                .append(append)
                .truncate(!append)
                .open(&path)
        });

    match opened {
        Ok(file) => {
            tracing::debug!("Exporting {}", path.display());
            if !append {
                report.written.push(path);
            }
            Sink::File {
                name: filename.to_string(),
                writer: BufWriter::new(file),
            }
        }
        Err(e) => {
            tracing::warn!("Cannot open export target {}: {}", path.display(), e);
            report.failed.push(filename.to_string());
            Sink::Discard
        }
    }
}

fn write_line(sink: Sink, body: &str, ending: &str, report: &mut ExportReport) -> Sink {
    match sink {
        Sink::File { name, mut writer } => {
            let result = writer
                .write_all(body.as_bytes())
                .and_then(|_| writer.write_all(ending.as_bytes()));
            match result {
                Ok(()) => Sink::File { name, writer },
                Err(e) => {
                    tracing::warn!("Write to export {} failed: {}", name, e);
                    report.failed.push(name);
                    Sink::Discard
                }
            }
        }
        other => other,
    }
}

fn close_sink(sink: Sink, report: &mut ExportReport) {
    if let Sink::File { name, mut writer } = sink {
        if let Err(e) = writer.flush() {
            tracing::warn!("Flushing export {} failed: {}", name, e);
            report.failed.push(name);
        }
    }
}

/// Extract the export blocks of an input document, in encounter order.
///
/// Nothing is written; this drives sequential per-file generation.
pub fn parse_blueprint(text: &str) -> Vec<BlueprintEntry> {
    let mut entries = Vec::new();
    let mut current: Option<BlueprintEntry> = None;
    let mut stripper = TemplateStripper::new();

    for line in text.split_inclusive('\n') {
        let (body, ending) = split_ending(line);

        if let Some(header) = parse_header(body) {
            entries.extend(current.take());
            stripper = TemplateStripper::new();

            if let ExportHeader::Start { filename, trailing } = header {
                let mut entry = BlueprintEntry {
                    filename: filename.to_string(),
                    content: String::new(),
                };
                if !trailing.is_empty() {
                    if let Some(kept) = stripper.strip_line(trailing) {
                        entry.content.push_str(&kept);
                        entry.content.push_str(ending);
                    }
                }
                current = Some(entry);
            }
            continue;
        }

        if let Some(entry) = current.as_mut() {
            if let Some(kept) = stripper.strip_line(body) {
                entry.content.push_str(&kept);
                entry.content.push_str(ending);
            }
        }
    }

    entries.extend(current);
    entries
}
