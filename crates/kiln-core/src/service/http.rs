//! HTTP generation service speaking one of the supported protocols.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::json;

use super::{GenerationService, Protocol, TransportError};

/// Connection settings for the generation service.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Wire protocol.
    pub protocol: Protocol,
    /// Base URL, e.g. `https://api.openai.com` or `http://localhost:11434`.
    pub endpoint: String,
    /// Model name sent with every request.
    pub model: String,
    /// API key, if the service wants one.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ProviderConfig {
    /// `protocol/model`, the identity that goes into cache keys.
    pub fn identity(&self) -> String {
        format!("{}/{}", self.protocol.name(), self.model)
    }
}

/// Blocking HTTP client for the generation service.
pub struct HttpGenerationService {
    client: Client,
    config: ProviderConfig,
    identity: String,
}

impl HttpGenerationService {
    /// Create a new service client.
    pub fn new(config: ProviderConfig) -> crate::error::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| crate::error::Error::Service(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            identity: config.identity(),
            config,
        })
    }

    fn url(&self) -> String {
        let base = self.config.endpoint.trim_end_matches('/');
        match self.config.protocol {
            Protocol::OpenAi => format!("{base}/v1/chat/completions"),
            Protocol::Google => format!("{base}/v1beta/models/{}:generateContent", self.config.model),
            Protocol::Ollama => format!("{base}/api/generate"),
        }
    }

    fn body(&self, prompt: &str) -> serde_json::Value {
        match self.config.protocol {
            Protocol::OpenAi => json!({
                "model": self.config.model,
                "messages": [{ "role": "user", "content": prompt }],
                "temperature": 0.2,
            }),
            Protocol::Google => json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
            }),
            Protocol::Ollama => json!({
                "model": self.config.model,
                "prompt": prompt,
                "stream": false,
            }),
        }
    }
}

impl GenerationService for HttpGenerationService {
    fn complete(&self, prompt: &str) -> Result<String, TransportError> {
        let url = self.url();
        tracing::debug!("Sending {} byte prompt to {}", prompt.len(), url);

        let mut request = self.client.post(&url).json(&self.body(prompt));
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = match self.config.protocol {
                Protocol::Google => request.header("x-goog-api-key", key),
                _ => request.bearer_auth(key),
            };
        }

        let response = request.send().map_err(|e| {
            tracing::error!("Generation request to {} failed: {}", url, e);
            TransportError::Request(e.to_string())
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let text = response
            .text()
            .map_err(|e| TransportError::Request(format!("failed to read response body: {e}")))?;

        tracing::debug!("Generation service responded {}", status);

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TransportError::RateLimited { retry_after });
        }
        if status.is_server_error() {
            return Err(TransportError::Request(format!("HTTP {status}")));
        }

        // Client errors carry an error envelope; the extract step reports it.
        Ok(text)
    }

    fn identity(&self) -> &str {
        &self.identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(protocol: Protocol) -> ProviderConfig {
        ProviderConfig {
            protocol,
            endpoint: "http://localhost:11434/".to_string(),
            model: "llama3".to_string(),
            api_key: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_urls_per_protocol() {
        let ollama = HttpGenerationService::new(config(Protocol::Ollama)).unwrap();
        assert_eq!(ollama.url(), "http://localhost:11434/api/generate");

        let google = HttpGenerationService::new(config(Protocol::Google)).unwrap();
        assert_eq!(
            google.url(),
            "http://localhost:11434/v1beta/models/llama3:generateContent"
        );

        let openai = HttpGenerationService::new(config(Protocol::OpenAi)).unwrap();
        assert_eq!(openai.url(), "http://localhost:11434/v1/chat/completions");
        assert_eq!(openai.identity(), "openai/llama3");
    }

    #[test]
    fn test_ollama_body_disables_streaming() {
        let service = HttpGenerationService::new(config(Protocol::Ollama)).unwrap();
        let body = service.body("hello");
        assert_eq!(body["stream"], false);
        assert_eq!(body["prompt"], "hello");
    }
}
