//! Exponential backoff for transient provider errors.

use crate::error::LlmError;
use crate::generator::{GenerateOptions, Generated, Generator};
use pma_core::config::GenerationConfig;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &GenerationConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
        }
    }

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

/// Run `op`, retrying transient failures with doubling delays.
/// Auth, quota and other errors are returned immediately.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 0u32;
    let mut delay = policy.initial_backoff;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                tracing::warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient provider error, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }
}

/// One generation call under `policy`.
pub async fn generate(
    generator: &dyn Generator,
    policy: RetryPolicy,
    prompt: &str,
    options: &GenerateOptions,
) -> Result<Generated, LlmError> {
    with_retry(policy, || generator.generate_content(prompt, options)).await
}
