//! Retry/backoff wrapper for LLM calls.
//!
//! Only `AgentError::TransientLlm` is retried — any other error from `invoke`
//! (bad request, auth, content filter) is assumed permanent and returned immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::AgentError;

/// `delay_i = min(initial * base^i, max_delay)`, scaled by a uniform random
/// factor in `[0.5, 1.0]` so concurrent callers don't retry in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            base: 2.0,
        }
    }
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        let raw = self.initial_delay.as_secs_f64() * self.base.powi(attempt as i32);
        let capped = raw.min(self.max_delay.as_secs_f64());
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        Duration::from_secs_f64(capped * jitter)
    }
}

/// Runs `attempt_fn` up to `config.max_attempts` times, sleeping with backoff between
/// attempts, but only when the error is `AgentError::TransientLlm`. Any other error
/// variant is returned on the first occurrence.
pub async fn retry_invoke<T, F, Fut>(config: &RetryConfig, mut attempt_fn: F) -> Result<T, AgentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AgentError>>,
{
    let mut attempt = 0;
    loop {
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(AgentError::TransientLlm(msg)) => {
                attempt += 1;
                if attempt >= config.max_attempts {
                    return Err(AgentError::TransientLlm(msg));
                }
                tokio::time::sleep(config.delay_for(attempt - 1)).await;
            }
            Err(other) => return Err(other),
        }
    }
}
