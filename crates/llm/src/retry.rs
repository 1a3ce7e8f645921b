use rand::Rng;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

use crate::document::PdfDocument;
use crate::error::LlmError;
use crate::provider::{CompletionProvider, CompletionRequest};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: usize,
    max_backoff: Duration,
    attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, 60, 120)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, max_backoff_secs: u64, attempt_timeout_secs: u64) -> Self {
        Self {
            max_retries: max_retries.max(1),
            max_backoff: Duration::from_secs(max_backoff_secs),
            attempt_timeout: Duration::from_secs(attempt_timeout_secs),
        }
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// `min(2^attempt, cap)` seconds, before jitter.
    pub fn base_delay(&self, attempt: usize) -> Duration {
        let exp = Duration::from_secs(1u64.checked_shl(attempt as u32).unwrap_or(u64::MAX));
        std::cmp::min(exp, self.max_backoff)
    }

    /// Exponential backoff with up to one second of jitter.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        self.base_delay(attempt) + Duration::from_secs_f64(jitter)
    }

    /// Run `f` until it succeeds, fails with a non-transient error, or the
    /// attempt budget runs out. Each attempt is bounded by `attempt_timeout`.
    pub async fn retry<F, Fut, T>(&self, operation_name: &str, mut f: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let mut attempt = 0;

        loop {
            let result = match timeout(self.attempt_timeout, f()).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(self.attempt_timeout)),
            };

            match result {
                Ok(value) => {
                    if attempt > 0 {
                        info!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => {
                    error!(operation = operation_name, error = %e, "Non-retryable error");
                    return Err(e);
                }
                Err(e) => {
                    if attempt + 1 >= self.max_retries {
                        error!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            error = %e,
                            "Max retries reached, provider still overloaded"
                        );
                        return Err(e);
                    }

                    let backoff = self.backoff(attempt);
                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Provider overloaded, retrying"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// A completion provider wrapped in a [`RetryPolicy`].
pub struct RetryingClient<P> {
    provider: P,
    policy: RetryPolicy,
}

impl<P: CompletionProvider> RetryingClient<P> {
    pub fn new(provider: P, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Free-text completion when `schema` is `None`, JSON otherwise.
    pub async fn complete(
        &self,
        document: &PdfDocument,
        prompt: &str,
        schema: Option<&Value>,
    ) -> Result<String, LlmError> {
        let operation = if schema.is_some() {
            "structured_completion"
        } else {
            "completion"
        };
        let request = CompletionRequest {
            document,
            prompt,
            schema,
        };
        self.policy
            .retry(operation, || self.provider.generate(request))
            .await
    }
}
