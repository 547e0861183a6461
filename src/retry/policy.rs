//! Built-in retry strategies.

// self
use crate::{_prelude::*, retry::RetryStrategy};

/// Waits the same delay between every attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedDelayRetry {
	/// Retries after the first attempt.
	pub max_retries: u32,
	/// Wait between attempts.
	pub delay: Duration,
	/// Whether delays are jittered.
	pub jitter: bool,
}
impl FixedDelayRetry {
	/// Creates a jittered fixed-delay strategy.
	pub fn new(max_retries: u32, delay: Duration) -> Self {
		Self { max_retries, delay, jitter: true }
	}

	/// Enables or disables jitter.
	pub fn with_jitter(mut self, jitter: bool) -> Self {
		self.jitter = jitter;

		self
	}
}
impl RetryStrategy for FixedDelayRetry {
	fn max_retries(&self) -> u32 {
		self.max_retries
	}

	fn base_delay(&self, _attempt: u32) -> Duration {
		self.delay
	}

	fn jitter(&self) -> bool {
		self.jitter
	}
}

/// Doubles (by default) the wait after every attempt, capped at `max_delay`.
#[derive(Clone, Debug, PartialEq)]
pub struct ExponentialBackoffRetry {
	/// Retries after the first attempt.
	pub max_retries: u32,
	/// Wait after the first attempt.
	pub initial_delay: Duration,
	/// Growth factor per attempt.
	pub multiplier: f64,
	/// Upper bound for the computed delay.
	pub max_delay: Duration,
	/// Whether delays are jittered.
	pub jitter: bool,
}
impl ExponentialBackoffRetry {
	/// Default cap for computed delays.
	pub const DEFAULT_MAX_DELAY: Duration = Duration::seconds(30);

	/// Creates a jittered strategy doubling from `initial_delay`.
	pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
		Self {
			max_retries,
			initial_delay,
			multiplier: 2.0,
			max_delay: Self::DEFAULT_MAX_DELAY,
			jitter: true,
		}
	}

	/// Overrides the growth factor.
	pub fn with_multiplier(mut self, multiplier: f64) -> Self {
		self.multiplier = multiplier;

		self
	}

	/// Overrides the delay cap.
	pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
		self.max_delay = max_delay;

		self
	}

	/// Enables or disables jitter.
	pub fn with_jitter(mut self, jitter: bool) -> Self {
		self.jitter = jitter;

		self
	}
}
impl RetryStrategy for ExponentialBackoffRetry {
	fn max_retries(&self) -> u32 {
		self.max_retries
	}

	fn base_delay(&self, attempt: u32) -> Duration {
		let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
		let secs = self.initial_delay.as_seconds_f64() * self.multiplier.powi(exponent);

		if !secs.is_finite() || secs >= self.max_delay.as_seconds_f64() {
			return self.max_delay;
		}

		Duration::seconds_f64(secs)
	}

	fn jitter(&self) -> bool {
		self.jitter
	}
}

/// Makes exactly one attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoRetry;
impl RetryStrategy for NoRetry {
	fn max_retries(&self) -> u32 {
		0
	}

	fn base_delay(&self, _attempt: u32) -> Duration {
		Duration::ZERO
	}

	fn jitter(&self) -> bool {
		false
	}
}
