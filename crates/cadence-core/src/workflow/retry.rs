//! Retry decisions and backoff for failed steps.
//!
//! Stateless: the interpreter tracks how many retries a step has used and
//! asks [`RetryHandler`] whether another one is allowed and how long to wait.

use std::time::Duration;

use cadence_types::workflow::{ErrorStrategy, RetryPolicy};
use tokio_util::sync::CancellationToken;

/// Cap on the backoff exponent so the multiplier cannot overflow.
const MAX_BACKOFF_SHIFT: u32 = 20;

pub struct RetryHandler;

impl RetryHandler {
    /// The policy to retry with, if another retry is allowed.
    ///
    /// Retries only happen under `ErrorStrategy::Retry` with a policy, and
    /// `retries_done` is the number of retries already performed.
    pub fn next_retry(
        strategy: ErrorStrategy,
        policy: Option<&RetryPolicy>,
        retries_done: u32,
    ) -> Option<&RetryPolicy> {
        match (strategy, policy) {
            (ErrorStrategy::Retry, Some(policy)) if retries_done < policy.max_retries => Some(policy),
            _ => None,
        }
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// Fixed at `interval_ms` unless `exponential_backoff` is set, in which
    /// case it doubles per retry and is clamped to `max_interval_ms`.
    pub fn delay_for(policy: &RetryPolicy, retry: u32) -> Duration {
        let base = policy.interval_ms;
        if !policy.exponential_backoff {
            return Duration::from_millis(base);
        }
        let shift = retry.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        let delay = base.saturating_mul(1u64 << shift);
        let delay = match policy.max_interval_ms {
            Some(cap) => delay.min(cap),
            None => delay,
        };
        Duration::from_millis(delay)
    }

    /// Sleep for `delay` unless cancelled first.
    ///
    /// Returns `false` if the token fired.
    pub async fn backoff(delay: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = cancel.cancelled() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32, exponential: bool, cap: Option<u64>) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            interval_ms: 100,
            exponential_backoff: exponential,
            max_interval_ms: cap,
        }
    }

    #[test]
    fn test_next_retry_respects_strategy_and_budget() {
        let p = policy(3, false, None);
        assert!(RetryHandler::next_retry(ErrorStrategy::Retry, Some(&p), 0).is_some());
        assert!(RetryHandler::next_retry(ErrorStrategy::Retry, Some(&p), 2).is_some());
        assert!(RetryHandler::next_retry(ErrorStrategy::Retry, Some(&p), 3).is_none());
        assert!(RetryHandler::next_retry(ErrorStrategy::Stop, Some(&p), 0).is_none());
        assert!(RetryHandler::next_retry(ErrorStrategy::Retry, None, 0).is_none());
    }

    #[test]
    fn test_fixed_delay() {
        let p = policy(3, false, None);
        assert_eq!(RetryHandler::delay_for(&p, 1), Duration::from_millis(100));
        assert_eq!(RetryHandler::delay_for(&p, 3), Duration::from_millis(100));
    }

    #[test]
    fn test_exponential_delay_with_cap() {
        let p = policy(5, true, Some(500));
        assert_eq!(RetryHandler::delay_for(&p, 1), Duration::from_millis(100));
        assert_eq!(RetryHandler::delay_for(&p, 2), Duration::from_millis(200));
        assert_eq!(RetryHandler::delay_for(&p, 3), Duration::from_millis(400));
        assert_eq!(RetryHandler::delay_for(&p, 4), Duration::from_millis(500));
        assert_eq!(RetryHandler::delay_for(&p, 60), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_completes_without_cancel() {
        let token = CancellationToken::new();
        assert!(RetryHandler::backoff(Duration::from_secs(10), &token).await);
    }

    #[tokio::test]
    async fn test_backoff_interrupted_by_cancel() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!RetryHandler::backoff(Duration::from_secs(3600), &token).await);
    }
}
