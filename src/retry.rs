//! Explicit retry policy for outbound HTTP calls

use std::{future::Future, time::Duration};

/// Retries an operation with exponential backoff
///
/// Only errors the caller classifies as transient are retried, everything
/// else is returned on first occurrence.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
	/// Total attempts, including the first one
	pub(crate) max_attempts: u32,
	/// Delay before the first retry
	pub(crate) base_delay: Duration,
	/// Ceiling applied to the backoff growth
	pub(crate) max_delay: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			base_delay: Duration::from_secs(4),
			max_delay: Duration::from_secs(10),
		}
	}
}

impl RetryPolicy {
	/// Backoff delay applied after the given zero-based attempt
	pub(crate) fn delay_for(&self, attempt: u32) -> Duration {
		let factor = 2_u32.saturating_pow(attempt);
		self.base_delay.saturating_mul(factor).min(self.max_delay)
	}

	/// Run `operation` until it succeeds, a non-transient error occurs or
	/// attempts run out
	pub(crate) async fn run<T, E, Fut>(
		&self,
		mut operation: impl FnMut() -> Fut,
		is_transient: impl Fn(&E) -> bool,
	) -> Result<T, E>
	where
		Fut: Future<Output = Result<T, E>>,
	{
		let mut attempt = 0;

		loop {
			match operation().await {
				Ok(value) => return Ok(value),
				Err(error) if attempt + 1 < self.max_attempts && is_transient(&error) => {
					tracing::warn!(attempt, "transient error, backing off before retry");
					tokio::time::sleep(self.delay_for(attempt)).await;
					attempt += 1;
				}
				Err(error) => return Err(error),
			}
		}
	}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[test]
	fn backoff_grows_and_caps() {
		let policy = RetryPolicy {
			max_attempts: 5,
			base_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(6),
		};

		assert_eq!(policy.delay_for(0), Duration::from_secs(1));
		assert_eq!(policy.delay_for(1), Duration::from_secs(2));
		assert_eq!(policy.delay_for(2), Duration::from_secs(4));
		assert_eq!(policy.delay_for(3), Duration::from_secs(6));
		assert_eq!(policy.delay_for(10), Duration::from_secs(6));
	}

	#[tokio::test]
	async fn retries_transient_errors_until_success() {
		let policy = RetryPolicy {
			max_attempts: 5,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(1),
		};
		let calls = AtomicU32::new(0);

		let result: Result<u32, &str> = policy
			.run(
				|| {
					let n = calls.fetch_add(1, Ordering::SeqCst);
					async move { if n < 2 { Err("timeout") } else { Ok(n) } }
				},
				|_| true,
			)
			.await;

		assert_eq!(result.unwrap(), 2);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn does_not_retry_permanent_errors() {
		let policy = RetryPolicy::default();
		let calls = AtomicU32::new(0);

		let result: Result<(), &str> = policy
			.run(
				|| {
					calls.fetch_add(1, Ordering::SeqCst);
					async { Err("bad request") }
				},
				|_| false,
			)
			.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn gives_up_after_max_attempts() {
		let policy = RetryPolicy {
			max_attempts: 3,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(1),
		};
		let calls = AtomicU32::new(0);

		let result: Result<(), &str> = policy
			.run(
				|| {
					calls.fetch_add(1, Ordering::SeqCst);
					async { Err("timeout") }
				},
				|_| true,
			)
			.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}
}
