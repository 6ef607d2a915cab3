//! Response envelopes of the supported generation protocols.
//!
//! Each protocol wraps the generated text differently. The configured
//! protocol picks exactly one decoder; we never guess by probing fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire protocol spoken by the generation service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// OpenAI-compatible `/v1/chat/completions`.
    #[default]
    OpenAi,
    /// Google Generative Language `generateContent`.
    Google,
    /// Ollama `/api/generate`.
    Ollama,
}

impl Protocol {
    /// Short name used in identities and messages.
    pub fn name(self) -> &'static str {
        match self {
            Protocol::OpenAi => "openai",
            Protocol::Google => "google",
            Protocol::Ollama => "ollama",
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Protocol::OpenAi),
            "google" | "gemini" => Ok(Protocol::Google),
            "ollama" => Ok(Protocol::Ollama),
            other => Err(format!("unknown protocol '{other}' (expected openai, google or ollama)")),
        }
    }
}

/// A decoded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEnvelope {
    /// OpenAI chat completion: first choice's message content.
    OpenAi { content: String },
    /// Google: concatenated text parts of the first candidate.
    Google { text: String },
    /// Ollama: the `response` field.
    Ollama { response: String },
    /// The service reported an error inside a successful transport.
    Error { message: String },
}

impl ResponseEnvelope {
    /// Decode `raw` according to `protocol`.
    pub fn decode(protocol: Protocol, raw: &str) -> Result<Self, serde_json::Error> {
        match protocol {
            Protocol::OpenAi => {
                let body: OpenAiBody = serde_json::from_str(raw)?;
                if let Some(error) = body.error {
                    return Ok(Self::error(&error));
                }
                let content = body
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default();
                Ok(Self::OpenAi { content })
            }
            Protocol::Google => {
                let body: GoogleBody = serde_json::from_str(raw)?;
                if let Some(error) = body.error {
                    return Ok(Self::error(&error));
                }
                let text = body
                    .candidates
                    .into_iter()
                    .next()
                    .map(|c| {
                        c.content
                            .parts
                            .into_iter()
                            .filter_map(|p| p.text)
                            .collect::<String>()
                    })
                    .unwrap_or_default();
                Ok(Self::Google { text })
            }
            Protocol::Ollama => {
                let body: OllamaBody = serde_json::from_str(raw)?;
                if let Some(error) = body.error {
                    return Ok(Self::error(&error));
                }
                Ok(Self::Ollama {
                    response: body.response.unwrap_or_default(),
                })
            }
        }
    }

    /// Generated text, or `None` for an error envelope.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::OpenAi { content } => Some(content),
            Self::Google { text } => Some(text),
            Self::Ollama { response } => Some(response),
            Self::Error { .. } => None,
        }
    }

    fn error(value: &Value) -> Self {
        let message = match value {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
            other => other.to_string(),
        };
        Self::Error { message }
    }
}

#[derive(Deserialize)]
struct OpenAiBody {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    error: Option<Value>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct GoogleBody {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    error: Option<Value>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: GoogleContent,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct OllamaBody {
    response: Option<String>,
    error: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_openai() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"int main(){}"}}]}"#;
        let env = ResponseEnvelope::decode(Protocol::OpenAi, raw).unwrap();
        assert_eq!(env.text(), Some("int main(){}"));
    }

    #[test]
    fn test_decode_google_joins_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}]}"#;
        let env = ResponseEnvelope::decode(Protocol::Google, raw).unwrap();
        assert_eq!(env, ResponseEnvelope::Google { text: "ab".to_string() });
    }

    #[test]
    fn test_decode_ollama() {
        let raw = r#"{"model":"llama3","response":"print(1)","done":true}"#;
        let env = ResponseEnvelope::decode(Protocol::Ollama, raw).unwrap();
        assert_eq!(env.text(), Some("print(1)"));
    }

    #[test]
    fn test_error_envelopes() {
        let openai = r#"{"error":{"message":"quota exceeded","type":"insufficient_quota"}}"#;
        assert_eq!(
            ResponseEnvelope::decode(Protocol::OpenAi, openai).unwrap(),
            ResponseEnvelope::Error { message: "quota exceeded".to_string() }
        );

        let ollama = r#"{"error":"model not found"}"#;
        let env = ResponseEnvelope::decode(Protocol::Ollama, ollama).unwrap();
        assert_eq!(env.text(), None);
    }

    #[test]
    fn test_non_json_fails_to_decode() {
        assert!(ResponseEnvelope::decode(Protocol::OpenAi, "<html>502</html>").is_err());
    }

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("Gemini".parse::<Protocol>(), Ok(Protocol::Google));
        assert!("soap".parse::<Protocol>().is_err());
    }
}
