//! Bounded retry with linearly increasing backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Attempts after the first one.
  pub max_retries: u32,
  pub base_delay: Duration,
}

/// Returned when every attempt failed.
#[derive(Debug)]
pub struct RetryExhausted<E> {
  pub attempts: u32,
  pub last_error: E,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_retries: 2, base_delay: Duration::from_secs(2) }
  }
}

impl RetryPolicy {
  pub fn new(max_retries: u32, base_delay: Duration) -> Self {
    Self { max_retries, base_delay }
  }

  pub fn max_attempts(&self) -> u32 {
    self.max_retries + 1
  }

  /// Delay after failed attempt `attempt` (1-based): base delay times attempt number.
  pub fn delay_after(&self, attempt: u32) -> Duration {
    self.base_delay * attempt
  }

  /// Runs `operation` until it succeeds or the attempts run out. The
  /// operation receives the 1-based attempt number.
  pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryExhausted<E>>
  where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
  {
    let mut attempt = 1;
    loop {
      match operation(attempt).await {
        Ok(value) => return Ok(value),
        Err(error) if attempt >= self.max_attempts() => {
          return Err(RetryExhausted { attempts: attempt, last_error: error });
        }
        Err(error) => {
          let delay = self.delay_after(attempt);
          warn!("Attempt {attempt}/{} failed: {error}; retrying in {delay:?}", self.max_attempts());
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  fn instant(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(max_retries, Duration::ZERO)
  }

  #[test]
  fn test_linear_backoff() {
    let policy = RetryPolicy::new(2, Duration::from_millis(500));
    assert_eq!(policy.delay_after(1), Duration::from_millis(500));
    assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
    assert_eq!(policy.max_attempts(), 3);
  }

  #[tokio::test]
  async fn test_first_success_returns_immediately() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let result: Result<&str, RetryExhausted<String>> = instant(2)
      .run(|_| {
        let counter = counter.clone();
        async move {
          counter.fetch_add(1, Ordering::SeqCst);
          Ok("done")
        }
      })
      .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_recovers_after_transient_failures() {
    let result: Result<u32, RetryExhausted<String>> = instant(2)
      .run(|attempt| async move {
        if attempt < 3 {
          Err(format!("flaky {attempt}"))
        } else {
          Ok(attempt)
        }
      })
      .await;

    assert_eq!(result.unwrap(), 3);
  }

  #[tokio::test]
  async fn test_exhaustion_reports_last_error() {
    let result: Result<(), RetryExhausted<String>> =
      instant(2).run(|attempt| async move { Err(format!("failure {attempt}")) }).await;

    let exhausted = result.unwrap_err();
    assert_eq!(exhausted.attempts, 3);
    assert_eq!(exhausted.last_error, "failure 3");
  }

  #[tokio::test]
  async fn test_zero_retries_means_single_attempt() {
    let result: Result<(), RetryExhausted<String>> =
      instant(0).run(|_| async { Err("nope".to_string()) }).await;
    assert_eq!(result.unwrap_err().attempts, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_sleeps_between_attempts() {
    let started = tokio::time::Instant::now();
    let policy = RetryPolicy::new(2, Duration::from_secs(2));
    let _: Result<(), RetryExhausted<String>> =
      policy.run(|_| async { Err("down".to_string()) }).await;

    // 2s after the first failure, 4s after the second, none after the last
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
  }
}
