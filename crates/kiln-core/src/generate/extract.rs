//! Turning a raw service response into code.

use thiserror::Error;

use crate::service::{Protocol, ResponseEnvelope};

/// Why a response yielded no usable code.
///
/// These cost a pass but never a build attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// The service answered with an error envelope.
    #[error("service reported an error: {0}")]
    Upstream(String),

    /// The response decoded but carried no text.
    #[error("empty response")]
    Empty,

    /// The body was not the configured protocol's envelope.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// How to treat Markdown code fences in the generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceMode {
    /// Take the first fenced block, or the whole trimmed text when unfenced.
    /// Either way the code ends with a newline.
    FirstBlock,
    /// Keep all text, dropping only the fence lines (multi-file output).
    StripFences,
}

/// Decode `raw` and pull the code out of it.
pub fn extract_code(protocol: Protocol, raw: &str, fence: FenceMode) -> Result<String, ExtractionError> {
    let text = extract_text(protocol, raw)?;

    let code = match fence {
        FenceMode::FirstBlock => first_fenced_block(&text).unwrap_or_else(|| format!("{}\n", text.trim())),
        FenceMode::StripFences => strip_fence_lines(&text),
    };

    if code.trim().is_empty() {
        return Err(ExtractionError::Empty);
    }
    Ok(code)
}

/// Decode `raw` into the generated text, without touching fences.
pub fn extract_text(protocol: Protocol, raw: &str) -> Result<String, ExtractionError> {
    if raw.trim().is_empty() {
        return Err(ExtractionError::Empty);
    }

    let envelope = ResponseEnvelope::decode(protocol, raw)
        .map_err(|e| ExtractionError::Malformed(e.to_string()))?;

    match envelope {
        ResponseEnvelope::Error { message } => Err(ExtractionError::Upstream(message)),
        other => {
            let text = other.text().unwrap_or_default();
            if text.trim().is_empty() {
                Err(ExtractionError::Empty)
            } else {
                Ok(text.to_string())
            }
        }
    }
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Body of the first fenced block; an unclosed fence runs to the end.
fn first_fenced_block(text: &str) -> Option<String> {
    let mut lines = text.lines().skip_while(|line| !is_fence(line));
    lines.next()?;

    let mut body = String::new();
    for line in lines.take_while(|line| !is_fence(line)) {
        body.push_str(line);
        body.push('\n');
    }
    Some(body)
}

fn strip_fence_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines().filter(|line| !is_fence(line)) {
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai(content: &str) -> String {
        serde_json::json!({ "choices": [{ "message": { "content": content } }] }).to_string()
    }

    #[test]
    fn test_first_block_is_taken() {
        let raw = openai("Here you go:\n```cpp\nint main() { return 0; }\n```\nand\n```\nother\n```");
        let code = extract_code(Protocol::OpenAi, &raw, FenceMode::FirstBlock).unwrap();
        assert_eq!(code, "int main() { return 0; }\n");
    }

    #[test]
    fn test_unfenced_text_is_used_whole() {
        let raw = openai("  print('hi')\n");
        let code = extract_code(Protocol::OpenAi, &raw, FenceMode::FirstBlock).unwrap();
        assert_eq!(code, "print('hi')\n");
    }

    #[test]
    fn test_strip_fences_keeps_exports() {
        let raw = openai("```\nEXPORT: \"a.c\"\nint a;\nEXPORT: END\n```\n```\nEXPORT: \"b.c\"\n```");
        let code = extract_code(Protocol::OpenAi, &raw, FenceMode::StripFences).unwrap();
        assert_eq!(code, "EXPORT: \"a.c\"\nint a;\nEXPORT: END\nEXPORT: \"b.c\"\n");
    }

    #[test]
    fn test_failures_are_typed() {
        assert_eq!(
            extract_code(Protocol::OpenAi, "", FenceMode::FirstBlock),
            Err(ExtractionError::Empty)
        );
        assert_eq!(
            extract_code(Protocol::OpenAi, &openai("```\n```"), FenceMode::FirstBlock),
            Err(ExtractionError::Empty)
        );
        assert!(matches!(
            extract_code(Protocol::Ollama, "not json", FenceMode::FirstBlock),
            Err(ExtractionError::Malformed(_))
        ));
        assert_eq!(
            extract_code(Protocol::Ollama, r#"{"error":"no model"}"#, FenceMode::FirstBlock),
            Err(ExtractionError::Upstream("no model".to_string()))
        );
    }
}
