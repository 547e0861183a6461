//! Optional observability helpers for pipeline calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `taskpipe.call` (with `method` and `path`
//!   fields) around every call and `taskpipe.refresh` around token refreshes.
//! - Enable `metrics` to increment the `taskpipe_call_total`, `taskpipe_retry_total`,
//!   `taskpipe_refresh_total`, and `taskpipe_cache_total` counters.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Terminal outcome of one logical call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// The call produced a value.
	Success,
	/// The call surfaced an error.
	Failure,
	/// The caller cancelled the call.
	Cancelled,
}
impl CallOutcome {
	/// Derives the outcome label from a call result.
	pub fn of<T>(result: &Result<T>) -> Self {
		match result {
			Ok(_) => Self::Success,
			Err(Error::Cancelled) => Self::Cancelled,
			Err(_) => Self::Failure,
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Success => "success",
			Self::Failure => "failure",
			Self::Cancelled => "cancelled",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each token refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// Entry to the refresh exchange.
	Attempt,
	/// New credentials were stored.
	Success,
	/// The exchange failed.
	Failure,
	/// A refresh request was satisfied by credentials another caller already obtained.
	Reused,
}
impl RefreshOutcome {
	const ALL: [Self; 4] = [Self::Attempt, Self::Success, Self::Failure, Self::Reused];

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Attempt => "attempt",
			Self::Success => "success",
			Self::Failure => "failure",
			Self::Reused => "reused",
		}
	}
}
impl Display for RefreshOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Refresh tallies owned by one authentication strategy.
///
/// Recording also forwards to [`record_refresh_outcome`], so the tallies stay readable when no
/// global metrics recorder is installed.
#[derive(Default)]
pub struct RefreshCounters([AtomicU64; RefreshOutcome::ALL.len()]);
impl RefreshCounters {
	/// Returns how many times `outcome` was recorded.
	pub fn count(&self, outcome: RefreshOutcome) -> u64 {
		self.0[outcome as usize].load(Ordering::Relaxed)
	}

	pub(crate) fn record(&self, outcome: RefreshOutcome) {
		self.0[outcome as usize].fetch_add(1, Ordering::Relaxed);

		record_refresh_outcome(outcome);
	}
}
impl Debug for RefreshCounters {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut map = f.debug_map();

		for outcome in RefreshOutcome::ALL {
			map.entry(&outcome.as_str(), &self.count(outcome));
		}

		map.finish()
	}
}

/// Cache events observed by the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheEvent {
	/// A read was served from the cache.
	Hit,
	/// A read missed and went to the network.
	Miss,
	/// A response was stored.
	Store,
	/// Entries were invalidated after a write.
	Invalidate,
	/// The backend failed and the cache was bypassed.
	Error,
}
impl CacheEvent {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Hit => "hit",
			Self::Miss => "miss",
			Self::Store => "store",
			Self::Invalidate => "invalidate",
			Self::Error => "error",
		}
	}
}
impl Display for CacheEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
