//! Generation service boundary.
//!
//! The loop sees the text-generation service as `complete(prompt) -> raw text`.
//! Transport failures are typed so rate limiting can back off harder than
//! other errors; decoding the raw text happens later, in the extract step.

mod envelope;
mod http;

use std::thread;
use std::time::Duration;

use thiserror::Error;

pub use envelope::{Protocol, ResponseEnvelope};
pub use http::{HttpGenerationService, ProviderConfig};

/// Failure to get a response out of the generation service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The service asked us to slow down.
    #[error("rate limited{}", retry_after.map(|d| format!(" (retry after {}s)", d.as_secs())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// Anything else: connection failures, 5xx, timeouts.
    #[error("request failed: {0}")]
    Request(String),
}

/// An opaque text-generation service.
pub trait GenerationService {
    /// Send a prompt and return the raw response body.
    fn complete(&self, prompt: &str) -> Result<String, TransportError>;

    /// Identity of the provider and model, used in the cache key.
    fn identity(&self) -> &str;
}

/// Longest server-requested pause we honor before retrying.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(120);

/// Bounded retry with backoff for transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay; rate limits double it per retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based) after `error`.
    pub fn delay_for(&self, attempt: u32, error: &TransportError) -> Duration {
        match error {
            TransportError::RateLimited {
                retry_after: Some(after),
            } => (*after).min(MAX_RETRY_AFTER),
            TransportError::RateLimited { retry_after: None } => {
                self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
            }
            TransportError::Request(_) => self.base_delay,
        }
    }
}

/// Call the service, retrying transport failures per `policy`.
///
/// This is separate from the loop's compilation retries: it only smooths over
/// flaky or throttled transports and gives up after `max_retries`.
pub fn complete_with_backoff(
    service: &dyn GenerationService,
    prompt: &str,
    policy: &RetryPolicy,
) -> Result<String, TransportError> {
    let mut attempt = 0;
    loop {
        match service.complete(prompt) {
            Ok(body) => return Ok(body),
            Err(error) if attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt, &error);
                tracing::warn!(
                    "Generation request failed ({}), retrying in {:.1}s",
                    error,
                    delay.as_secs_f64()
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
