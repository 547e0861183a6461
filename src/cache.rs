//! Optional response caching keyed by request fingerprints.
//!
//! [`MemoryCache`] keeps entries in-process with a periodic expiry sweep and creation-time
//! eviction; [`DistributedCache`] delegates to an external [`DistributedStore`] and degrades the
//! operations a backend cannot honor (pattern removal, full clear) into logged no-ops.
//!
//! Patterns are globs: `*` matches any run of characters, `?` matches one character, and `\`
//! escapes the next character. Build patterns from untrusted text with [`escape_glob`].

pub mod distributed;
pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use distributed::*;
pub use memory::*;
#[cfg(feature = "redis")] pub use self::redis::RedisStore;

// crates.io
use regex::Regex;
use time::PrimitiveDateTime;
// self
use crate::{
	_prelude::*,
	error::CacheError,
	http::Method,
};

/// Boxed future returned by cache strategies and stores.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Cached payload with its creation and expiration instants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
	/// Cached bytes.
	pub value: Bytes,
	/// Instant the entry was stored.
	pub created_at: OffsetDateTime,
	/// Instant after which the entry must never be returned.
	pub expires_at: OffsetDateTime,
}
impl CacheEntry {
	/// Creates an entry stored now that lives for `ttl`.
	///
	/// A TTL reaching past the end of the calendar keeps the entry until the last representable
	/// instant.
	pub fn new(value: Bytes, ttl: Duration) -> Self {
		let created_at = OffsetDateTime::now_utc();
		let expires_at =
			created_at.checked_add(ttl).unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc());

		Self { value, created_at, expires_at }
	}

	/// Returns `true` once `instant` has reached the expiration instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}
}

/// Read/write cache consulted by the connection.
pub trait CacheStrategy
where
	Self: Send + Sync,
{
	/// Returns the live value stored under `key`.
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Bytes>>;

	/// Stores `value` under `key` for `ttl`, or the strategy's default TTL when `None`.
	fn set<'a>(&'a self, key: &'a str, value: Bytes, ttl: Option<Duration>) -> CacheFuture<'a, ()>;

	/// Removes `key`; `true` when an entry existed.
	fn remove<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool>;

	/// Removes every key matching the glob `pattern` and returns how many were removed.
	fn remove_by_pattern<'a>(&'a self, pattern: &'a str) -> CacheFuture<'a, u64>;

	/// Removes every entry.
	fn clear(&self) -> CacheFuture<'_, ()>;

	/// Returns `true` when a live value is stored under `key`.
	fn exists<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool>;
}

/// Cache key for a call: method plus fully resolved URL.
pub fn fingerprint(method: &Method, url: &Url) -> String {
	format!("{method} {url}")
}

/// Glob matching every cached read of `url` and of anything nested below it, ignoring the query.
pub fn invalidation_pattern(url: &Url) -> String {
	let mut base = url.clone();

	base.set_query(None);
	base.set_fragment(None);

	format!("{}*", escape_glob(&fingerprint(&Method::GET, &base)))
}

/// Escapes glob metacharacters so `text` matches only itself.
pub fn escape_glob(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());

	for c in text.chars() {
		if matches!(c, '*' | '?' | '[' | ']' | '\\') {
			escaped.push('\\');
		}

		escaped.push(c);
	}

	escaped
}

/// Compiles a glob into an anchored regular expression.
pub fn compile_glob(pattern: &str) -> Result<Regex, CacheError> {
	let mut source = String::with_capacity(pattern.len() + 2);
	let mut chars = pattern.chars();

	source.push('^');

	while let Some(c) = chars.next() {
		match c {
			'*' => source.push_str(".*"),
			'?' => source.push('.'),
			'\\' => match chars.next() {
				Some(next) => source.push_str(&regex::escape(next.encode_utf8(&mut [0; 4]))),
				None => return Err(CacheError::InvalidPattern { pattern: pattern.to_owned() }),
			},
			other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
		}
	}

	source.push('$');

	Regex::new(&source).map_err(|_| CacheError::InvalidPattern { pattern: pattern.to_owned() })
}
