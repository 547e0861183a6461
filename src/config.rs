//! Plain configuration consumed by [`Connection::from_options`](crate::connection::Connection::from_options).
//!
//! Durations are expressed in milliseconds on the wire (`*_ms` keys) so the structure
//! deserializes from any serde format without custom parsing.

// self
use crate::{
	_prelude::*,
	codec::WireFormat,
	retry::{ExponentialBackoffRetry, FixedDelayRetry, NoRetry, RetryStrategy},
};

/// Top-level options for one connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
	/// API base address, e.g. `https://api.example.com/api/v2`.
	pub base_url: Option<String>,
	/// Fixed token sent as the entire `Authorization` value.
	pub static_token: Option<String>,
	/// Refreshable OAuth credentials; take precedence over `static_token`.
	pub oauth: Option<OAuthOptions>,
	/// Response caching.
	pub cache: CacheOptions,
	/// Retry policy.
	pub retry: RetryOptions,
	/// Upper bound for a single attempt.
	#[serde(rename = "timeout_ms", with = "duration_ms")]
	pub timeout: Duration,
	/// Payload format.
	pub wire_format: WireFormat,
	/// Window before expiry in which OAuth tokens are refreshed proactively.
	#[serde(rename = "expiry_buffer_ms", with = "duration_ms")]
	pub expiry_buffer: Duration,
}
impl Default for ClientOptions {
	fn default() -> Self {
		Self {
			base_url: None,
			static_token: None,
			oauth: None,
			cache: CacheOptions::default(),
			retry: RetryOptions::default(),
			timeout: Duration::seconds(30),
			wire_format: WireFormat::Json,
			expiry_buffer: Duration::minutes(1),
		}
	}
}

/// OAuth client and token material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthOptions {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	#[serde(default)]
	pub client_secret: Option<String>,
	/// Token endpoint.
	pub token_url: String,
	/// Current access token.
	pub access_token: String,
	/// Refresh token; without one the access token is used until it is rejected.
	#[serde(default)]
	pub refresh_token: Option<String>,
	/// Absolute expiry of the access token.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub expires_at: Option<OffsetDateTime>,
}

/// Response cache settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
	/// Whether reads are cached in-process.
	pub enabled: bool,
	/// Lifetime for entries stored without a per-call TTL.
	#[serde(rename = "default_ttl_ms", with = "duration_ms")]
	pub default_ttl: Duration,
	/// Size bound that triggers eviction.
	pub max_entries: usize,
	/// Interval between expiry sweeps.
	#[serde(rename = "sweep_interval_ms", with = "duration_ms")]
	pub sweep_interval: Duration,
}
impl Default for CacheOptions {
	fn default() -> Self {
		Self {
			enabled: false,
			default_ttl: Duration::minutes(5),
			max_entries: 1_000,
			sweep_interval: Duration::minutes(1),
		}
	}
}

/// Delay growth between attempts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
	/// Same delay every time.
	Fixed,
	/// Delay doubles after every attempt.
	#[default]
	Exponential,
}

/// Retry policy settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
	/// Retries after the first attempt; `0` disables retrying.
	pub max_retries: u32,
	/// Fixed delay, or the first delay for exponential backoff.
	#[serde(rename = "delay_ms", with = "duration_ms")]
	pub delay: Duration,
	/// Delay growth.
	pub backoff: Backoff,
	/// Cap for exponential delays.
	#[serde(rename = "max_delay_ms", with = "duration_ms")]
	pub max_delay: Duration,
	/// Whether delays are jittered by ±10%.
	pub jitter: bool,
}
impl RetryOptions {
	/// Builds the configured strategy.
	pub fn strategy(&self) -> Arc<dyn RetryStrategy> {
		if self.max_retries == 0 {
			return Arc::new(NoRetry);
		}

		match self.backoff {
			Backoff::Fixed =>
				Arc::new(FixedDelayRetry::new(self.max_retries, self.delay).with_jitter(self.jitter)),
			Backoff::Exponential => Arc::new(
				ExponentialBackoffRetry::new(self.max_retries, self.delay)
					.with_max_delay(self.max_delay)
					.with_jitter(self.jitter),
			),
		}
	}
}
impl Default for RetryOptions {
	fn default() -> Self {
		Self {
			max_retries: 3,
			delay: Duration::seconds(1),
			backoff: Backoff::Exponential,
			max_delay: Duration::seconds(30),
			jitter: true,
		}
	}
}

mod duration_ms {
	// crates.io
	use serde::{Deserializer, Serializer, de::Error as _};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(u64::try_from(duration.whole_milliseconds()).unwrap_or_default())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		let millis = u64::deserialize(deserializer)?;

		i64::try_from(millis).map(Duration::milliseconds).map_err(D::Error::custom)
	}
}
