//! Removal of `$${ ... }$$` instruction spans from exported text.

use super::{TEMPLATE_CLOSE, TEMPLATE_OPEN};

/// Line-by-line stripper for template spans.
///
/// A span may open on one line and close several lines later, so whether we
/// are inside a span is carried from one `strip_line` call to the next.
#[derive(Debug, Default)]
pub struct TemplateStripper {
    inside: bool,
}

impl TemplateStripper {
    /// Create a stripper positioned outside any span.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the previous line left a span open.
    pub fn is_inside(&self) -> bool {
        self.inside
    }

    /// Strip template content from one line (without its line ending).
    ///
    /// Returns `None` when the line carried nothing but template content and
    /// should disappear from the output.
    pub fn strip_line(&mut self, line: &str) -> Option<String> {
        let mut kept = String::with_capacity(line.len());
        let mut rest = line;
        let mut touched = self.inside;

        loop {
            if self.inside {
                match rest.find(TEMPLATE_CLOSE) {
                    Some(close) => {
                        rest = &rest[close + TEMPLATE_CLOSE.len()..];
                        self.inside = false;
                    }
                    None => break,
                }
            } else {
                match rest.find(TEMPLATE_OPEN) {
                    Some(open) => {
                        kept.push_str(&rest[..open]);
                        rest = &rest[open + TEMPLATE_OPEN.len()..];
                        self.inside = true;
                        touched = true;
                    }
                    None => {
                        kept.push_str(rest);
                        break;
                    }
                }
            }
        }

        if touched && kept.trim().is_empty() {
            None
        } else {
            Some(kept)
        }
    }

    /// Strip a whole document, keeping the line structure of what remains.
    pub fn strip_text(text: &str) -> String {
        let mut stripper = Self::new();
        let mut out = String::with_capacity(text.len());

        for line in text.split_inclusive('\n') {
            let (body, ending) = split_ending(line);
            if let Some(kept) = stripper.strip_line(body) {
                out.push_str(&kept);
                out.push_str(ending);
            }
        }

        if stripper.is_inside() {
            tracing::warn!("Unterminated template span, dropped to end of text");
        }
        out
    }
}

/// Split a line into body and line ending.
pub(crate) fn split_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}
