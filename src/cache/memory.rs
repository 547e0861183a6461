//! In-process cache with a periodic expiry sweep and creation-time eviction.

// std
use std::sync::{
	Weak,
	atomic::{AtomicU64, Ordering},
};
// crates.io
use dashmap::DashMap;
use tokio::task::JoinHandle;
// self
use crate::{
	_prelude::*,
	cache::{CacheEntry, CacheFuture, CacheStrategy, compile_glob},
};

/// Point-in-time counters for a [`MemoryCache`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
	/// Reads served from the cache.
	pub hits: u64,
	/// Reads that found nothing live.
	pub misses: u64,
	/// Entries removed by size-bound eviction.
	pub evictions: u64,
	/// Entries currently stored (including expired ones not yet swept).
	pub entries: usize,
}

/// Concurrent in-process cache.
///
/// A background task sweeps expired entries every `sweep_interval`, independent of any TTL. When
/// the store grows past `max_entries`, the oldest quartile by *creation* time is evicted; reads do
/// not refresh an entry's position, so this is not an LRU.
#[derive(Debug)]
pub struct MemoryCache {
	store: Arc<MemoryStore>,
	sweeper: Option<JoinHandle<()>>,
}
impl MemoryCache {
	/// Default lifetime for entries stored without an explicit TTL.
	pub const DEFAULT_TTL: Duration = Duration::minutes(5);
	/// Default size bound.
	pub const DEFAULT_MAX_ENTRIES: usize = 1_000;
	/// Default interval between expiry sweeps.
	pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::minutes(1);
	/// Longest interval between expiry sweeps; larger settings are clamped.
	pub const MAX_SWEEP_INTERVAL: Duration = Duration::days(1);

	/// Creates a cache with the default size bound and sweep interval.
	pub fn new(default_ttl: Duration) -> Self {
		Self::with_limits(default_ttl, Self::DEFAULT_MAX_ENTRIES, Self::DEFAULT_SWEEP_INTERVAL)
	}

	/// Creates a cache with explicit limits.
	///
	/// The sweeper is spawned on the current Tokio runtime; outside a runtime, expired entries are
	/// only dropped lazily on access and during eviction.
	pub fn with_limits(default_ttl: Duration, max_entries: usize, sweep_interval: Duration) -> Self {
		let store = Arc::new(MemoryStore {
			entries: DashMap::new(),
			default_ttl,
			max_entries: max_entries.max(1),
			hits: AtomicU64::new(0),
			misses: AtomicU64::new(0),
			evictions: AtomicU64::new(0),
		});
		let sweeper = tokio::runtime::Handle::try_current()
			.ok()
			.filter(|_| sweep_interval.is_positive())
			.map(|handle| {
				let interval = sweep_interval.min(Self::MAX_SWEEP_INTERVAL);

				handle.spawn(sweep_loop(Arc::downgrade(&store), interval))
			});

		Self { store, sweeper }
	}

	/// Returns current counters.
	pub fn stats(&self) -> CacheStats {
		CacheStats {
			hits: self.store.hits.load(Ordering::Relaxed),
			misses: self.store.misses.load(Ordering::Relaxed),
			evictions: self.store.evictions.load(Ordering::Relaxed),
			entries: self.store.entries.len(),
		}
	}

	/// Removes expired entries now; returns how many were dropped.
	pub fn sweep(&self) -> usize {
		self.store.sweep(OffsetDateTime::now_utc())
	}
}
impl Drop for MemoryCache {
	fn drop(&mut self) {
		if let Some(sweeper) = self.sweeper.take() {
			sweeper.abort();
		}
	}
}
impl CacheStrategy for MemoryCache {
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Bytes>> {
		Box::pin(async move { Ok(self.store.get(key, OffsetDateTime::now_utc())) })
	}

	fn set<'a>(&'a self, key: &'a str, value: Bytes, ttl: Option<Duration>) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			let ttl = ttl.unwrap_or(self.store.default_ttl);

			if ttl.is_positive() {
				self.store.insert(key.to_owned(), CacheEntry::new(value, ttl));
			} else {
				self.store.entries.remove(key);
			}

			Ok(())
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool> {
		Box::pin(async move { Ok(self.store.entries.remove(key).is_some()) })
	}

	fn remove_by_pattern<'a>(&'a self, pattern: &'a str) -> CacheFuture<'a, u64> {
		Box::pin(async move {
			let regex = compile_glob(pattern)?;
			let before = self.store.entries.len();

			self.store.entries.retain(|key, _| !regex.is_match(key));

			Ok(before.saturating_sub(self.store.entries.len()) as u64)
		})
	}

	fn clear(&self) -> CacheFuture<'_, ()> {
		Box::pin(async move {
			self.store.entries.clear();

			Ok(())
		})
	}

	fn exists<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();

			Ok(self.store.entries.get(key).is_some_and(|entry| !entry.is_expired_at(now)))
		})
	}
}

#[derive(Debug)]
struct MemoryStore {
	entries: DashMap<String, CacheEntry>,
	default_ttl: Duration,
	max_entries: usize,
	hits: AtomicU64,
	misses: AtomicU64,
	evictions: AtomicU64,
}
impl MemoryStore {
	fn get(&self, key: &str, now: OffsetDateTime) -> Option<Bytes> {
		let live = self
			.entries
			.get(key)
			.and_then(|entry| (!entry.is_expired_at(now)).then(|| entry.value.clone()));

		match live {
			Some(value) => {
				self.hits.fetch_add(1, Ordering::Relaxed);

				Some(value)
			},
			None => {
				self.entries.remove_if(key, |_, entry| entry.is_expired_at(now));
				self.misses.fetch_add(1, Ordering::Relaxed);

				None
			},
		}
	}

	fn insert(&self, key: String, entry: CacheEntry) {
		self.entries.insert(key, entry);

		if self.entries.len() > self.max_entries {
			self.evict(OffsetDateTime::now_utc());
		}
	}

	fn sweep(&self, now: OffsetDateTime) -> usize {
		let before = self.entries.len();

		self.entries.retain(|_, entry| !entry.is_expired_at(now));

		before.saturating_sub(self.entries.len())
	}

	fn evict(&self, now: OffsetDateTime) {
		self.sweep(now);

		let len = self.entries.len();

		if len <= self.max_entries {
			return;
		}

		let mut by_age = self
			.entries
			.iter()
			.map(|entry| (entry.created_at, entry.key().clone()))
			.collect::<Vec<_>>();

		by_age.sort_unstable_by(|a, b| a.0.cmp(&b.0));

		let quartile = (len / 4).max(1);

		for (_, key) in by_age.into_iter().take(quartile) {
			if self.entries.remove(&key).is_some() {
				self.evictions.fetch_add(1, Ordering::Relaxed);
			}
		}

		trace_event!(debug, evicted = quartile, "Evicted the oldest cache entries.");
	}
}

async fn sweep_loop(store: Weak<MemoryStore>, interval: Duration) {
	let mut ticker = tokio::time::interval(interval.unsigned_abs());

	// The first tick completes immediately.
	ticker.tick().await;

	loop {
		ticker.tick().await;

		let Some(store) = store.upgrade() else {
			break;
		};

		store.sweep(OffsetDateTime::now_utc());
	}
}
