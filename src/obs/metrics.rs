// self
use crate::obs::{CacheEvent, CallOutcome, RefreshOutcome};

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("taskpipe_call_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

/// Records one scheduled retry attempt.
pub fn record_retry() {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("taskpipe_retry_total").increment(1);
	}
}

/// Records a token refresh outcome.
pub fn record_refresh_outcome(outcome: RefreshOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("taskpipe_refresh_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

/// Records a cache event.
pub fn record_cache_event(event: CacheEvent) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("taskpipe_cache_total", "event" => event.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = event;
	}
}
