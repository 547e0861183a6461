//! Cache strategy backed by an external key-value store.

// self
use crate::{
	_prelude::*,
	cache::{CacheFuture, CacheStrategy, escape_glob},
	error::CacheError,
};

/// Minimal contract an external store must satisfy.
///
/// Pattern deletion and full flush are optional; the defaults report
/// [`CacheError::Unsupported`], which [`DistributedCache`] turns into a logged no-op.
pub trait DistributedStore
where
	Self: Send + Sync,
{
	/// Reads the value stored under `key`.
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Bytes>>;

	/// Writes `value` under `key` with an expiry of `ttl`.
	fn set<'a>(&'a self, key: &'a str, value: Bytes, ttl: Duration) -> CacheFuture<'a, ()>;

	/// Deletes `key`; `true` when it existed.
	fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool>;

	/// Returns `true` when `key` exists.
	fn exists<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool>;

	/// Deletes keys matching the glob `pattern`.
	fn delete_matching<'a>(&'a self, pattern: &'a str) -> CacheFuture<'a, u64> {
		let _ = pattern;

		Box::pin(async { Err(CacheError::Unsupported { operation: "pattern removal" }) })
	}

	/// Deletes every key.
	fn flush(&self) -> CacheFuture<'_, ()> {
		Box::pin(async { Err(CacheError::Unsupported { operation: "clear" }) })
	}
}

/// [`CacheStrategy`] over a [`DistributedStore`], namespacing every key with a prefix.
#[derive(Debug)]
pub struct DistributedCache<S> {
	store: S,
	default_ttl: Duration,
	key_prefix: String,
}
impl<S> DistributedCache<S>
where
	S: DistributedStore,
{
	/// Default namespace for keys written by this crate.
	pub const DEFAULT_PREFIX: &'static str = "taskpipe:";

	/// Wraps `store`, storing entries for `default_ttl` unless a call overrides it.
	pub fn new(store: S, default_ttl: Duration) -> Self {
		Self { store, default_ttl, key_prefix: Self::DEFAULT_PREFIX.into() }
	}

	/// Overrides the key namespace.
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.key_prefix = prefix.into();

		self
	}

	/// Returns the wrapped store.
	pub fn store(&self) -> &S {
		&self.store
	}

	fn key(&self, key: &str) -> String {
		format!("{}{key}", self.key_prefix)
	}
}
impl<S> CacheStrategy for DistributedCache<S>
where
	S: DistributedStore,
{
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Bytes>> {
		Box::pin(async move { self.store.get(&self.key(key)).await })
	}

	fn set<'a>(&'a self, key: &'a str, value: Bytes, ttl: Option<Duration>) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			let ttl = ttl.unwrap_or(self.default_ttl);

			if !ttl.is_positive() {
				self.store.delete(&self.key(key)).await?;

				return Ok(());
			}

			self.store.set(&self.key(key), value, ttl).await
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool> {
		Box::pin(async move { self.store.delete(&self.key(key)).await })
	}

	fn remove_by_pattern<'a>(&'a self, pattern: &'a str) -> CacheFuture<'a, u64> {
		Box::pin(async move {
			let namespaced = format!("{}{pattern}", escape_glob(&self.key_prefix));

			match self.store.delete_matching(&namespaced).await {
				Err(CacheError::Unsupported { operation }) => {
					skip_unsupported(operation);

					Ok(0)
				},
				other => other,
			}
		})
	}

	fn clear(&self) -> CacheFuture<'_, ()> {
		Box::pin(async move {
			match self.store.flush().await {
				Err(CacheError::Unsupported { operation }) => {
					skip_unsupported(operation);

					Ok(())
				},
				other => other,
			}
		})
	}

	fn exists<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool> {
		Box::pin(async move { self.store.exists(&self.key(key)).await })
	}
}

fn skip_unsupported(operation: &'static str) {
	#[cfg(feature = "tracing")]
	tracing::warn!(operation, "Cache backend does not support this operation; skipping.");
	#[cfg(not(feature = "tracing"))]
	let _ = operation;
}
