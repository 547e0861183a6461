//! Refreshable bearer-token authentication with single-flight refresh.
//!
//! [`OAuthAuth`] keeps one [`AuthToken`] behind a read/write holder that is only ever written
//! while the refresh guard is held. Concurrent callers that observe an expired token queue on the
//! guard; the first performs the token endpoint exchange and the rest reuse its result, so at most
//! one refresh is in flight per strategy instance.

mod exchange;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{AuthFuture, AuthToken, AuthenticationStrategy},
	classify::ApiError,
	error::ConfigError,
	http::{HeaderMap, HeaderValue, HttpTransport, header},
	obs::{PipelineSpan, RefreshCounters, RefreshOutcome},
};

/// Client credentials for the token endpoint.
#[derive(Clone, Debug)]
pub struct OAuthCredentials {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret; sent with HTTP Basic authentication when present.
	pub client_secret: Option<String>,
	/// Token endpoint.
	pub token_url: Url,
}

/// Sends `Bearer <access-token>`, tracks expiry, and refreshes through the token endpoint.
pub struct OAuthAuth {
	client: exchange::TokenClient,
	transport: Arc<dyn HttpTransport>,
	token: RwLock<Option<AuthToken>>,
	refresh_guard: AsyncMutex<()>,
	generation: AtomicU64,
	expiry_buffer: Duration,
	counters: RefreshCounters,
}
impl OAuthAuth {
	/// Default window before expiry in which a token is refreshed proactively.
	pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::minutes(1);

	/// Creates a strategy that refreshes `token` through `transport`.
	pub fn new(
		credentials: OAuthCredentials,
		token: AuthToken,
		transport: Arc<dyn HttpTransport>,
	) -> Result<Self, ConfigError> {
		let client = exchange::build_client(
			&credentials.client_id,
			credentials.client_secret.as_deref(),
			&credentials.token_url,
		)?;

		Ok(Self {
			client,
			transport,
			token: RwLock::new(Some(token)),
			refresh_guard: AsyncMutex::new(()),
			generation: AtomicU64::new(0),
			expiry_buffer: Self::DEFAULT_EXPIRY_BUFFER,
			counters: RefreshCounters::default(),
		})
	}

	/// Overrides the proactive refresh window.
	pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
		self.expiry_buffer = buffer;

		self
	}

	/// Returns a snapshot of the current token.
	pub fn token(&self) -> Option<AuthToken> {
		self.token.read().clone()
	}

	/// Returns the refresh tallies for this strategy.
	pub fn refresh_counters(&self) -> &RefreshCounters {
		&self.counters
	}

	fn can_refresh(&self) -> bool {
		self.token.read().as_ref().is_some_and(AuthToken::can_refresh)
	}

	/// Exchanges the refresh token unless the held credential already moved past `rejected`.
	///
	/// `rejected` is the access token a failed request carried, when known.
	async fn refresh_inner(&self, rejected: Option<&str>) -> Result<bool> {
		let observed = self.generation.load(Ordering::Acquire);
		let _singleflight = self.refresh_guard.lock().await;

		// Another caller refreshed while this one waited on the guard.
		if self.generation.load(Ordering::Acquire) != observed {
			self.counters.record(RefreshOutcome::Reused);

			return Ok(true);
		}

		let replaced = rejected.is_some_and(|rejected| {
			self.token.read().as_ref().is_some_and(|token| token.access_token.expose() != rejected)
		});

		// The rejected credential was already replaced by an earlier refresh.
		if replaced {
			self.counters.record(RefreshOutcome::Reused);

			return Ok(true);
		}

		let refresh_token = self
			.token
			.read()
			.as_ref()
			.and_then(|token| token.refresh_token.clone())
			.filter(|secret| !secret.is_empty());
		let Some(refresh_token) = refresh_token else {
			return Ok(false);
		};

		self.counters.record(RefreshOutcome::Attempt);

		let span = PipelineSpan::refresh();
		let exchanged = span
			.instrument(exchange::refresh_token(
				&self.client,
				self.transport.as_ref(),
				refresh_token.expose(),
			))
			.await;

		match exchanged {
			Ok(token) => {
				*self.token.write() = Some(token);
				self.generation.fetch_add(1, Ordering::AcqRel);
				self.counters.record(RefreshOutcome::Success);

				trace_event!(debug, "Access token refreshed.");

				Ok(true)
			},
			Err(e) => {
				self.counters.record(RefreshOutcome::Failure);

				trace_event!(warn, error = %e, "Access token refresh failed.");

				match e {
					Error::Refresh { .. } => Ok(false),
					other => Err(other),
				}
			},
		}
	}
}
impl Debug for OAuthAuth {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthAuth")
			.field("token", &self.token.read())
			.field("expiry_buffer", &self.expiry_buffer)
			.field("counters", &self.counters)
			.finish_non_exhaustive()
	}
}
impl AuthenticationStrategy for OAuthAuth {
	fn headers(&self) -> AuthFuture<'_, HeaderMap> {
		Box::pin(async move {
			if self.is_expired(self.expiry_buffer) && self.can_refresh() {
				self.refresh_inner(None).await?;
			}

			let token = self.token.read().clone().ok_or(ConfigError::MissingCredentials)?;
			let mut value = HeaderValue::from_str(&format!("Bearer {}", token.access_token.expose()))
				.map_err(|_| ConfigError::InvalidHeader { name: header::AUTHORIZATION.to_string() })?;

			value.set_sensitive(true);

			let mut headers = HeaderMap::new();

			headers.insert(header::AUTHORIZATION, value);

			Ok(headers)
		})
	}

	fn validate_credentials(&self) -> bool {
		let guard = self.token.read();
		let Some(token) = guard.as_ref() else {
			return false;
		};

		!token.access_token.is_empty()
			&& (!token.expires_within(OffsetDateTime::now_utc(), Duration::ZERO)
				|| token.can_refresh())
	}

	fn refresh(&self) -> AuthFuture<'_, bool> {
		Box::pin(self.refresh_inner(None))
	}

	fn is_expired(&self, buffer: Duration) -> bool {
		match self.token.read().as_ref() {
			Some(token) => token.expires_within(OffsetDateTime::now_utc(), buffer),
			None => true,
		}
	}

	fn clear_credentials(&self) {
		*self.token.write() = None;
	}

	fn handle_authentication_failure<'a>(
		&'a self,
		error: &'a ApiError,
		sent: Option<&'a HeaderValue>,
	) -> AuthFuture<'a, bool> {
		Box::pin(async move {
			// 403 means the credential was accepted but lacks permission.
			if error.status() != 401 || !self.can_refresh() {
				return Ok(false);
			}

			let rejected = sent
				.and_then(|value| value.to_str().ok())
				.and_then(|value| value.strip_prefix("Bearer "));

			self.refresh_inner(rejected).await
		})
	}
}
