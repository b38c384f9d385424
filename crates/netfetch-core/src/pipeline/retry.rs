//! Retry/backoff policy (SPEC_FULL §4.10), modeled on the teacher's doubling-backoff-capped
//! loop (`http_client.rs::send_with_retry`), generalized to configurable factor + jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::NetfetchError;

use super::options::Method;

/// True if `method` is retried by HTTP semantics and `error` (or `status`) looks transient.
pub fn should_retry(method: Method, error: Option<&NetfetchError>, status: Option<u16>, cfg: &RetryConfig) -> bool {
    if !method.is_idempotent() {
        return false;
    }
    if let Some(e) = error {
        if e.is_retryable() {
            return true;
        }
    }
    if let Some(status) = status {
        return cfg.retryable_statuses.contains(&status);
    }
    false
}

/// `delay = min(initial * backoff^attempt, max_delay)`, randomized by a uniform `[0.5, 1.5]`
/// factor when `jitter` is enabled. `attempt` is 0-based (the first retry is attempt 0).
pub fn backoff_delay(attempt: u32, cfg: &RetryConfig) -> Duration {
    let scaled = cfg.initial_delay.as_secs_f64() * cfg.backoff_factor.powi(attempt as i32);
    let capped = scaled.min(cfg.max_delay.as_secs_f64());
    let factor = if cfg.jitter { rand::thread_rng().gen_range(0.5..1.5) } else { 1.0 };
    Duration::from_secs_f64((capped * factor).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RetryConfig {
        RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
            jitter: false,
            retryable_statuses: vec![429, 502, 503, 504],
        }
    }

    #[test]
    fn delay_doubles_each_attempt_without_jitter() {
        let c = cfg();
        assert_eq!(backoff_delay(0, &c), Duration::from_millis(100));
        assert_eq!(backoff_delay(1, &c), Duration::from_millis(200));
        assert_eq!(backoff_delay(2, &c), Duration::from_millis(400));
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let c = cfg();
        let delay = backoff_delay(20, &c);
        assert_eq!(delay, Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_within_half_to_one_and_a_half_of_unjittered() {
        let mut c = cfg();
        c.jitter = true;
        let base = 100.0;
        for attempt in 0..3 {
            let delay = backoff_delay(attempt, &c).as_secs_f64() * 1000.0;
            let unjittered = base * 2f64.powi(attempt as i32);
            assert!(delay >= unjittered * 0.5 - 1.0 && delay <= unjittered * 1.5 + 1.0);
        }
    }

    #[test]
    fn non_idempotent_method_is_never_retried_even_on_retryable_status() {
        assert!(!should_retry(Method::Post, None, Some(503), &cfg()));
    }

    #[test]
    fn idempotent_method_retries_on_configured_status() {
        assert!(should_retry(Method::Get, None, Some(503), &cfg()));
        assert!(!should_retry(Method::Get, None, Some(404), &cfg()));
    }

    #[test]
    fn idempotent_method_retries_on_retryable_network_error() {
        let err = NetfetchError::Network(crate::error::NetworkError::Timeout);
        assert!(should_retry(Method::Get, Some(&err), None, &cfg()));
    }
}
