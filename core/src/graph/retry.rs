//! Retry policy applied by the StateGraph executor when a node returns
//! `Err(AgentError)` mid-run.

use std::time::Duration;

/// How many times, and on what schedule, a failing node gets re-run before its
/// error propagates out of the executor.
#[derive(Debug, Clone)]
pub enum RetryPolicy {
    /// Fail immediately, no retry.
    None,
    /// Constant delay between attempts.
    Fixed {
        max_attempts: usize,
        interval: Duration,
    },
    /// Delay doubles (or scales by `multiplier`) each attempt, capped at `max_interval`.
    Exponential {
        max_attempts: usize,
        initial_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
    },
}

impl RetryPolicy {
    pub fn none() -> Self {
        RetryPolicy::None
    }

    pub fn fixed(max_attempts: usize, interval: Duration) -> Self {
        RetryPolicy::Fixed {
            max_attempts,
            interval,
        }
    }

    pub fn exponential(
        max_attempts: usize,
        initial_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
    ) -> Self {
        RetryPolicy::Exponential {
            max_attempts,
            initial_interval,
            max_interval,
            multiplier,
        }
    }

    pub fn should_retry(&self, attempt: usize) -> bool {
        match self {
            RetryPolicy::None => false,
            RetryPolicy::Fixed { max_attempts, .. } => attempt < *max_attempts,
            RetryPolicy::Exponential { max_attempts, .. } => attempt < *max_attempts,
        }
    }

    pub fn delay(&self, attempt: usize) -> Duration {
        match self {
            RetryPolicy::None => Duration::ZERO,
            RetryPolicy::Fixed { interval, .. } => *interval,
            RetryPolicy::Exponential {
                initial_interval,
                max_interval,
                multiplier,
                ..
            } => {
                let delay_secs = initial_interval.as_secs_f64() * multiplier.powi(attempt as i32);
                let delay = Duration::from_secs_f64(delay_secs);
                delay.min(*max_interval)
            }
        }
    }

    pub fn max_attempts(&self) -> usize {
        match self {
            RetryPolicy::None => 0,
            RetryPolicy::Fixed { max_attempts, .. } => *max_attempts,
            RetryPolicy::Exponential { max_attempts, .. } => *max_attempts,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_never_retries() {
        let policy = RetryPolicy::none();
        assert!(!policy.should_retry(0));
        assert_eq!(policy.delay(0), Duration::ZERO);
        assert_eq!(policy.max_attempts(), 0);
    }

    #[test]
    fn fixed_retries_up_to_max_attempts_at_a_constant_delay() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(1));
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn exponential_delay_doubles_each_attempt() {
        let policy =
            RetryPolicy::exponential(3, Duration::from_secs(1), Duration::from_secs(10), 2.0);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));

        assert_eq!(policy.delay(0), Duration::from_secs(1)); // 1 * 2^0 = 1
        assert_eq!(policy.delay(1), Duration::from_secs(2)); // 1 * 2^1 = 2
        assert_eq!(policy.delay(2), Duration::from_secs(4)); // 1 * 2^2 = 4
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn exponential_delay_is_capped_at_max_interval() {
        let policy =
            RetryPolicy::exponential(5, Duration::from_secs(1), Duration::from_secs(5), 2.0);
        // delay(3) = 1 * 2^3 = 8, but capped at 5
        assert_eq!(policy.delay(3), Duration::from_secs(5));
    }
}
