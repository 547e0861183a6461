//! The request pipeline: one logical call end to end.
//!
//! [`Connection::send`] resolves the descriptor's URL, consults the cache for reads, runs the
//! attempts through the retry strategy (materializing a fresh request and attaching credentials
//! per attempt), classifies failures, gives the authentication strategy one chance to recover
//! from an authentication failure, and finally decodes the body and updates the cache.

// self
use crate::{
	_prelude::*,
	auth::{AuthToken, AuthenticationStrategy, OAuthAuth, OAuthCredentials, StaticTokenAuth},
	cache::{self, CacheStrategy, MemoryCache},
	classify::{self, ApiErrorKind},
	codec::{JsonSerialization, SerializationStrategy, WireFormat},
	config::ClientOptions,
	error::ConfigError,
	http::{HeaderValue, HttpResponse, HttpTransport, header},
	obs::{self, CacheEvent, CallOutcome, PipelineSpan},
	plugin::{PipelinePlugin, PluginContext},
	request::{CachePolicy, RequestDescriptor},
	retry::{NoRetry, Retrier, RetryStrategy},
};

/// Composes transport, authentication, retry, cache, and codec into one pipeline.
pub struct Connection<S = JsonSerialization> {
	base_url: Url,
	transport: Arc<dyn HttpTransport>,
	auth: Arc<dyn AuthenticationStrategy>,
	retry: Arc<dyn RetryStrategy>,
	cache: Option<Arc<dyn CacheStrategy>>,
	codec: S,
	plugins: Vec<Arc<dyn PipelinePlugin>>,
	timeout: Option<Duration>,
}
impl Connection {
	/// Starts a builder for `base_url`.
	pub fn builder(base_url: impl Into<String>) -> ConnectionBuilder {
		ConnectionBuilder::new(base_url.into())
	}
}
impl Connection<WireFormat> {
	/// Validates `options` and wires the strategies they describe over a reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn from_options(options: &ClientOptions) -> Result<Self, ConfigError> {
		let transport = crate::http::ReqwestTransport::with_timeout(options.timeout)?;

		Self::from_options_with_transport(options, Arc::new(transport))
	}

	/// Validates `options` and wires the strategies they describe over `transport`.
	pub fn from_options_with_transport(
		options: &ClientOptions,
		transport: Arc<dyn HttpTransport>,
	) -> Result<Self, ConfigError> {
		let base_url = options
			.base_url
			.as_deref()
			.filter(|url| !url.trim().is_empty())
			.ok_or(ConfigError::MissingBaseUrl)?;
		let auth: Arc<dyn AuthenticationStrategy> = match (&options.oauth, &options.static_token) {
			(Some(oauth), _) => {
				let token_url = Url::parse(&oauth.token_url)
					.map_err(|source| ConfigError::InvalidUrl { field: "token", source })?;
				let mut token = AuthToken::new(oauth.access_token.clone());

				if let Some(refresh) = &oauth.refresh_token {
					token = token.with_refresh_token(refresh.clone());
				}
				if let Some(expires_at) = oauth.expires_at {
					token = token.expires_at(expires_at);
				}

				let credentials = OAuthCredentials {
					client_id: oauth.client_id.clone(),
					client_secret: oauth.client_secret.clone(),
					token_url,
				};

				Arc::new(
					OAuthAuth::new(credentials, token, transport.clone())?
						.with_expiry_buffer(options.expiry_buffer),
				)
			},
			(None, Some(token)) if !token.trim().is_empty() =>
				Arc::new(StaticTokenAuth::new(token.clone())),
			_ => return Err(ConfigError::MissingCredentials),
		};
		let mut builder = Connection::builder(base_url)
			.transport(transport)
			.auth(auth)
			.retry(options.retry.strategy())
			.timeout(options.timeout);

		if options.cache.enabled {
			builder = builder.cache(Arc::new(MemoryCache::with_limits(
				options.cache.default_ttl,
				options.cache.max_entries,
				options.cache.sweep_interval,
			)));
		}

		builder.codec(options.wire_format).build()
	}
}
impl<S> Connection<S>
where
	S: SerializationStrategy,
{
	/// Base address every descriptor path is resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Authentication strategy in use.
	pub fn auth(&self) -> &Arc<dyn AuthenticationStrategy> {
		&self.auth
	}

	/// Cache strategy in use, if any.
	pub fn cache(&self) -> Option<&Arc<dyn CacheStrategy>> {
		self.cache.as_ref()
	}

	/// Serialization strategy in use.
	pub fn codec(&self) -> &S {
		&self.codec
	}

	/// Executes `descriptor` and decodes the response body into `T`.
	///
	/// An empty or `null` body decodes to `T`'s absent value (`None`, `()`), or fails for types
	/// that have none.
	pub async fn send<T>(
		&self,
		descriptor: &RequestDescriptor,
		cancellation: &CancellationToken,
	) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let body = self.send_raw(descriptor, cancellation).await?;

		self.codec.decode(&body).map_err(|e| {
			let error = Error::from(e);

			self.notify_error(descriptor, &error);

			error
		})
	}

	/// Executes `descriptor` when no response body is expected.
	pub async fn send_empty(
		&self,
		descriptor: &RequestDescriptor,
		cancellation: &CancellationToken,
	) -> Result<()> {
		self.send_raw(descriptor, cancellation).await.map(|_| ())
	}

	/// Executes `descriptor` and returns the raw success body.
	pub async fn send_raw(
		&self,
		descriptor: &RequestDescriptor,
		cancellation: &CancellationToken,
	) -> Result<Bytes> {
		let span = PipelineSpan::call(descriptor.method().as_str(), descriptor.path_template());
		let result = span.instrument(self.execute(descriptor, cancellation)).await;

		obs::record_call_outcome(CallOutcome::of(&result));

		if let Err(e) = &result {
			self.notify_error(descriptor, e);
		}

		result
	}

	async fn execute(
		&self,
		descriptor: &RequestDescriptor,
		cancellation: &CancellationToken,
	) -> Result<Bytes> {
		let url = descriptor.resolve_url(&self.base_url)?;
		let cached = self
			.cacheable(descriptor)
			.map(|store| (store, cache::fingerprint(descriptor.method(), &url)));

		if let Some((store, key)) = &cached {
			match store.get(key).await {
				Ok(Some(body)) => {
					obs::record_cache_event(CacheEvent::Hit);
					trace_event!(debug, key = key.as_str(), "Cache hit.");

					return Ok(body);
				},
				Ok(None) => obs::record_cache_event(CacheEvent::Miss),
				Err(e) => cache_failure("read", &e),
			}
		}

		let sent = Mutex::new(None);
		let mut recovered = false;
		let response = loop {
			let response = self.attempt_all(descriptor, &url, &sent, cancellation).await?;

			if response.status().is_success() {
				break response;
			}

			let error = classify::classify(&response);

			if !recovered && error.kind() == ApiErrorKind::Authentication {
				recovered = true;

				let credential = sent.lock().clone();
				let retry_call = tokio::select! {
					biased;
					_ = cancellation.cancelled() => return Err(Error::Cancelled),
					retry_call = self.auth.handle_authentication_failure(&error, credential.as_ref()) =>
						retry_call?,
				};

				if retry_call {
					trace_event!(debug, "Credentials recovered; retrying the call once.");

					continue;
				}
			}

			return Err(error.into());
		};
		let body = Bytes::from(response.into_body());

		if let Some((store, key)) = &cached {
			let ttl = match descriptor.cache_policy() {
				CachePolicy::Ttl(ttl) => Some(*ttl),
				_ => None,
			};

			match store.set(key, body.clone(), ttl).await {
				Ok(()) => obs::record_cache_event(CacheEvent::Store),
				Err(e) => cache_failure("write", &e),
			}
		} else if !descriptor.is_read()
			&& let Some(store) = &self.cache
		{
			match store.remove_by_pattern(&cache::invalidation_pattern(&url)).await {
				Ok(_) => obs::record_cache_event(CacheEvent::Invalidate),
				Err(e) => cache_failure("invalidate", &e),
			}
		}

		Ok(body)
	}

	async fn attempt_all(
		&self,
		descriptor: &RequestDescriptor,
		url: &Url,
		sent: &Mutex<Option<HeaderValue>>,
		cancellation: &CancellationToken,
	) -> Result<HttpResponse> {
		let ctx = PluginContext { descriptor };

		Retrier::new(self.retry.as_ref(), cancellation)
			.execute(
				|attempt| async move {
					let mut request = descriptor.materialize(url)?;

					for plugin in &self.plugins {
						plugin.on_request(&ctx, attempt, &request);
					}

					self.auth.apply_authentication(&mut request).await?;

					*sent.lock() = request.headers().get(header::AUTHORIZATION).cloned();

					let pending = self.transport.execute(request);
					let response = match self.timeout {
						Some(limit) => tokio::time::timeout(limit.unsigned_abs(), pending)
							.await
							.map_err(|_| TransportError::Timeout)??,
						None => pending.await?,
					};

					for plugin in &self.plugins {
						plugin.on_response(&ctx, attempt, &response);
					}

					Ok(response)
				},
				|retry| {
					for plugin in &self.plugins {
						plugin.on_retry(&ctx, retry);
					}
				},
			)
			.await
	}

	fn cacheable(&self, descriptor: &RequestDescriptor) -> Option<&Arc<dyn CacheStrategy>> {
		if !descriptor.is_read() || matches!(descriptor.cache_policy(), CachePolicy::Bypass) {
			return None;
		}

		self.cache.as_ref()
	}

	fn notify_error(&self, descriptor: &RequestDescriptor, error: &Error) {
		let ctx = PluginContext { descriptor };

		for plugin in &self.plugins {
			plugin.on_error(&ctx, error);
		}
	}
}
impl<S> Debug for Connection<S>
where
	S: Debug,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Connection")
			.field("base_url", &self.base_url.as_str())
			.field("codec", &self.codec)
			.field("cached", &self.cache.is_some())
			.field("plugins", &self.plugins.len())
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

/// Builder for [`Connection`] values.
pub struct ConnectionBuilder<S = JsonSerialization> {
	base_url: String,
	transport: Option<Arc<dyn HttpTransport>>,
	auth: Option<Arc<dyn AuthenticationStrategy>>,
	retry: Arc<dyn RetryStrategy>,
	cache: Option<Arc<dyn CacheStrategy>>,
	codec: S,
	plugins: Vec<Arc<dyn PipelinePlugin>>,
	timeout: Option<Duration>,
}
impl ConnectionBuilder {
	fn new(base_url: String) -> Self {
		Self {
			base_url,
			transport: None,
			auth: None,
			retry: Arc::new(NoRetry),
			cache: None,
			codec: JsonSerialization,
			plugins: Vec::new(),
			timeout: None,
		}
	}
}
impl<S> ConnectionBuilder<S>
where
	S: SerializationStrategy,
{
	/// Uses `transport` for every attempt (and for OAuth refreshes wired by the caller).
	pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Sets the authentication strategy.
	pub fn auth(mut self, auth: Arc<dyn AuthenticationStrategy>) -> Self {
		self.auth = Some(auth);

		self
	}

	/// Sets the retry strategy; defaults to a single attempt.
	pub fn retry(mut self, retry: Arc<dyn RetryStrategy>) -> Self {
		self.retry = retry;

		self
	}

	/// Enables caching with `cache`.
	pub fn cache(mut self, cache: Arc<dyn CacheStrategy>) -> Self {
		self.cache = Some(cache);

		self
	}

	/// Registers a plugin; plugins run in registration order.
	pub fn plugin(mut self, plugin: Arc<dyn PipelinePlugin>) -> Self {
		self.plugins.push(plugin);

		self
	}

	/// Bounds every attempt by `timeout`; an elapsed attempt fails with a retryable timeout.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout.is_positive().then_some(timeout);

		self
	}

	/// Switches the serialization strategy.
	pub fn codec<C>(self, codec: C) -> ConnectionBuilder<C>
	where
		C: SerializationStrategy,
	{
		ConnectionBuilder {
			base_url: self.base_url,
			transport: self.transport,
			auth: self.auth,
			retry: self.retry,
			cache: self.cache,
			codec,
			plugins: self.plugins,
			timeout: self.timeout,
		}
	}

	/// Validates the configuration and produces a [`Connection`].
	pub fn build(self) -> Result<Connection<S>, ConfigError> {
		if self.base_url.trim().is_empty() {
			return Err(ConfigError::MissingBaseUrl);
		}

		let base_url = Url::parse(&self.base_url)
			.map_err(|source| ConfigError::InvalidUrl { field: "base", source })?;
		let auth = self.auth.ok_or(ConfigError::MissingCredentials)?;
		let transport = match self.transport {
			Some(transport) => transport,
			#[cfg(feature = "reqwest")]
			None => Arc::new(crate::http::ReqwestTransport::with_timeout(
				self.timeout.unwrap_or(Duration::seconds(30)),
			)?),
			#[cfg(not(feature = "reqwest"))]
			None => return Err(ConfigError::MissingTransport),
		};

		Ok(Connection {
			base_url,
			transport,
			auth,
			retry: self.retry,
			cache: self.cache,
			codec: self.codec,
			plugins: self.plugins,
			timeout: self.timeout,
		})
	}
}

fn cache_failure(operation: &'static str, error: &crate::error::CacheError) {
	obs::record_cache_event(CacheEvent::Error);

	#[cfg(feature = "tracing")]
	tracing::warn!(operation, error = %error, "Cache backend failed; bypassing it.");
	#[cfg(not(feature = "tracing"))]
	let _ = (operation, error);
}
