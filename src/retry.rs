//! Bounded retry with backoff, `Retry-After` precedence, and cooperative cancellation.
//!
//! A logical call runs its attempts strictly one after another. After each attempt the
//! [`RetryStrategy`] decides whether the outcome is worth another try and how long to wait; a
//! server-provided `Retry-After` always overrides the locally computed delay. Cancellation wins
//! over every policy decision: it aborts an in-flight attempt or an inter-attempt delay and no
//! further attempt is made.

pub mod policy;

pub use policy::*;

// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	http::{HttpResponse, parse_retry_after},
	obs,
};

/// HTTP statuses that are worth another attempt.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];
/// Symmetric jitter applied to computed delays (±10%).
pub const JITTER_FACTOR: f64 = 0.1;

/// What one attempt produced; a response and a failure are mutually exclusive.
#[derive(Clone, Copy, Debug)]
pub enum AttemptOutcome<'a> {
	/// The transport returned a response (any status).
	Response(&'a HttpResponse),
	/// The attempt failed before a response was obtained.
	Error(&'a Error),
}
impl AttemptOutcome<'_> {
	/// Returns `true` when the outcome belongs to the retryable set.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Response(response) => RETRYABLE_STATUSES.contains(&response.status().as_u16()),
			Self::Error(error) => error.is_retryable(),
		}
	}

	/// Server-provided delay carried by the response, if any.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Response(response) => parse_retry_after(response.headers()),
			Self::Error(_) => None,
		}
	}
}

/// State of one logical call at the moment a retry is scheduled.
#[derive(Clone, Copy, Debug)]
pub struct RetryContext<'a> {
	/// Attempt that just finished (1-based).
	pub attempt: u32,
	/// What that attempt produced.
	pub outcome: AttemptOutcome<'a>,
	/// Wait before the next attempt.
	pub delay: Duration,
}

/// Decides whether and when a failed attempt is retried.
pub trait RetryStrategy
where
	Self: Send + Sync,
{
	/// Maximum number of retries after the first attempt.
	fn max_retries(&self) -> u32;

	/// Policy delay before the attempt following `attempt`, before jitter.
	fn base_delay(&self, attempt: u32) -> Duration;

	/// Whether computed delays are perturbed by [`JITTER_FACTOR`].
	fn jitter(&self) -> bool {
		true
	}

	/// Returns `true` when `outcome` of `attempt` (1-based) warrants another attempt.
	fn should_retry(&self, outcome: &AttemptOutcome<'_>, attempt: u32) -> bool {
		attempt <= self.max_retries() && outcome.is_retryable()
	}

	/// Computes the wait after `attempt`; `Retry-After` wins over the policy delay.
	fn calculate_delay(&self, attempt: u32, outcome: &AttemptOutcome<'_>) -> Duration {
		if let Some(delay) = outcome.retry_after() {
			return delay;
		}

		let delay = self.base_delay(attempt);

		if self.jitter() { apply_jitter(delay, JITTER_FACTOR) } else { delay }
	}
}

/// Perturbs `delay` uniformly within `±factor`.
pub fn apply_jitter(delay: Duration, factor: f64) -> Duration {
	if delay <= Duration::ZERO || factor <= 0.0 {
		return delay;
	}

	let scale = rand::rng().random_range((1.0 - factor)..=(1.0 + factor));

	Duration::seconds_f64(delay.as_seconds_f64() * scale)
}

/// Drives attempts for one logical call.
pub struct Retrier<'a> {
	strategy: &'a dyn RetryStrategy,
	cancellation: &'a CancellationToken,
}
impl<'a> Retrier<'a> {
	/// Creates a retrier bound to `strategy` and the caller's cancellation signal.
	pub fn new(strategy: &'a dyn RetryStrategy, cancellation: &'a CancellationToken) -> Self {
		Self { strategy, cancellation }
	}

	/// Runs `operation` until it yields a terminal outcome or the retry budget is spent.
	///
	/// `operation` receives the 1-based attempt number and must build a fresh request each time.
	/// `on_retry` observes every scheduled retry. After exhaustion the last response (with its
	/// failing status) or the last error is returned unchanged.
	pub async fn execute<F, Fut, R>(&self, mut operation: F, mut on_retry: R) -> Result<HttpResponse>
	where
		F: FnMut(u32) -> Fut,
		Fut: Future<Output = Result<HttpResponse>>,
		R: FnMut(&RetryContext<'_>),
	{
		let mut attempt = 1;

		loop {
			if self.cancellation.is_cancelled() {
				return Err(Error::Cancelled);
			}

			let result = tokio::select! {
				biased;
				_ = self.cancellation.cancelled() => return Err(Error::Cancelled),
				result = operation(attempt) => result,
			};
			let outcome = match &result {
				Ok(response) => AttemptOutcome::Response(response),
				Err(Error::Cancelled) => return result,
				Err(error) => AttemptOutcome::Error(error),
			};

			if !self.strategy.should_retry(&outcome, attempt) {
				return result;
			}

			let delay = self.strategy.calculate_delay(attempt, &outcome);
			let context = RetryContext { attempt, outcome, delay };

			on_retry(&context);
			obs::record_retry();

			trace_event!(debug, attempt, delay_ms = delay.whole_milliseconds() as u64, "Retrying call.");

			tokio::select! {
				biased;
				_ = self.cancellation.cancelled() => return Err(Error::Cancelled),
				_ = tokio::time::sleep(delay.unsigned_abs()) => {},
			}

			attempt += 1;
		}
	}
}
