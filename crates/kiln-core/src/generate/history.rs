//! Error memory carried from one failed pass into the next prompt.

use std::collections::VecDeque;

/// Accumulated record of failed attempts.
///
/// Bounded by a character budget: once over it, the oldest entries are
/// dropped so the newest failure is always carried forward.
#[derive(Debug, Clone)]
pub struct ErrorHistory {
    entries: VecDeque<String>,
    budget: usize,
    len: usize,
}

impl ErrorHistory {
    /// Empty history with a character budget.
    pub fn new(budget: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            budget,
            len: 0,
        }
    }

    /// Record what went wrong on `pass`.
    pub fn push(&mut self, pass: u32, text: &str) {
        let mut entry = format!("--- pass {pass} ---\n{}\n", text.trim());
        if entry.len() > self.budget {
            entry = truncate_front(&entry, self.budget);
        }

        self.len += entry.len();
        self.entries.push_back(entry);

        while self.len > self.budget && self.entries.len() > 1 {
            if let Some(dropped) = self.entries.pop_front() {
                self.len -= dropped.len();
            }
        }
    }

    /// Whether nothing has failed yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The history as prompt text.
    pub fn render(&self) -> String {
        self.entries.iter().map(String::as_str).collect()
    }
}

/// Keep the last `budget` bytes of `text`, on a char boundary.
fn truncate_front(text: &str, budget: usize) -> String {
    let mut start = text.len().saturating_sub(budget);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

/// First `max_lines` lines of `text`, for terminal excerpts.
pub fn excerpt(text: &str, max_lines: usize) -> String {
    let mut lines = text.trim().lines();
    let mut out: Vec<&str> = lines.by_ref().take(max_lines).collect();
    if lines.next().is_some() {
        out.push("...");
    }
    out.join("\n")
}
