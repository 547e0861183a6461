//! Redis-backed [`DistributedStore`].

// crates.io
use async_lock::OnceCell;
use redis::{Client, RedisError, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	cache::{CacheFuture, DistributedStore},
	error::CacheError,
};

const SCAN_BATCH: usize = 100;

/// Redis store using a lazily established multiplexed connection manager.
///
/// `FLUSHDB` is deliberately not issued: the database may be shared, so a full clear is reported
/// as unsupported and degrades to a no-op.
#[derive(Clone)]
pub struct RedisStore {
	client: Client,
	connection: Arc<OnceCell<ConnectionManager>>,
}
impl RedisStore {
	/// Opens a client for `url` (e.g. `redis://127.0.0.1/`); connecting is deferred to first use.
	pub fn open(url: &str) -> Result<Self, CacheError> {
		Ok(Self { client: Client::open(url).map_err(backend)?, connection: Default::default() })
	}

	async fn connection(&self) -> Result<ConnectionManager, CacheError> {
		let manager = self
			.connection
			.get_or_try_init(|| async {
				trace_event!(debug, "Initializing redis connection manager.");

				self.client.get_connection_manager().await
			})
			.await
			.map_err(backend)?;

		Ok(manager.clone())
	}
}
impl Debug for RedisStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisStore").finish_non_exhaustive()
	}
}
impl DistributedStore for RedisStore {
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Bytes>> {
		Box::pin(async move {
			let mut con = self.connection().await?;
			let value: Option<Vec<u8>> =
				redis::cmd("GET").arg(key).query_async(&mut con).await.map_err(backend)?;

			Ok(value.map(Bytes::from))
		})
	}

	fn set<'a>(&'a self, key: &'a str, value: Bytes, ttl: Duration) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			let mut con = self.connection().await?;
			let millis = u64::try_from(ttl.whole_milliseconds()).unwrap_or(u64::MAX).max(1);

			redis::cmd("SET")
				.arg(key)
				.arg(value.as_ref())
				.arg("PX")
				.arg(millis)
				.query_async::<()>(&mut con)
				.await
				.map_err(backend)
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool> {
		Box::pin(async move {
			let mut con = self.connection().await?;
			let deleted: i64 =
				redis::cmd("DEL").arg(key).query_async(&mut con).await.map_err(backend)?;

			Ok(deleted > 0)
		})
	}

	fn exists<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool> {
		Box::pin(async move {
			let mut con = self.connection().await?;
			let found: i64 =
				redis::cmd("EXISTS").arg(key).query_async(&mut con).await.map_err(backend)?;

			Ok(found > 0)
		})
	}

	fn delete_matching<'a>(&'a self, pattern: &'a str) -> CacheFuture<'a, u64> {
		Box::pin(async move {
			let mut con = self.connection().await?;
			let mut cursor = 0_u64;
			let mut removed = 0_u64;

			loop {
				let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
					.arg(cursor)
					.arg("MATCH")
					.arg(pattern)
					.arg("COUNT")
					.arg(SCAN_BATCH)
					.query_async(&mut con)
					.await
					.map_err(backend)?;

				if !keys.is_empty() {
					let deleted: u64 =
						redis::cmd("DEL").arg(&keys).query_async(&mut con).await.map_err(backend)?;

					removed += deleted;
				}
				if next == 0 {
					break;
				}

				cursor = next;
			}

			Ok(removed)
		})
	}
}

fn backend(e: RedisError) -> CacheError {
	CacheError::Backend { message: e.to_string() }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn open_rejects_malformed_urls_without_connecting() {
		assert!(RedisStore::open("redis://127.0.0.1:6379/").is_ok());
		assert!(matches!(RedisStore::open("not a url"), Err(CacheError::Backend { .. })));
	}

	#[tokio::test]
	async fn clear_is_refused_rather_than_flushing_a_shared_database() {
		let store = RedisStore::open("redis://127.0.0.1:6379/").expect("Client should open.");

		assert_eq!(
			store.flush().await,
			Err(CacheError::Unsupported { operation: "clear" })
		);
	}
}
