//! Immutable call descriptors and URL/query resolution.
//!
//! A [`RequestDescriptor`] captures one logical API call before execution. Its body is
//! materialized once into [`Bytes`] so every retry attempt resends identical content, and each
//! attempt receives an independent [`HttpRequest`] built by [`RequestDescriptor::materialize`].

pub mod query;

pub use query::*;

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	codec::SerializationStrategy,
	error::ConfigError,
	http::{HeaderName, HeaderValue, HttpRequest, Method, header},
};

/// Immutable description of one logical API call.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
	method: Method,
	path_template: String,
	path: String,
	query: Vec<QueryParam>,
	headers: Vec<(HeaderName, HeaderValue)>,
	body: Option<Bytes>,
	cache: CachePolicy,
}
impl RequestDescriptor {
	/// Starts a builder for `method` against a path template such as `/task/{task_id}`.
	pub fn builder(method: Method, path_template: impl Into<String>) -> RequestDescriptorBuilder {
		RequestDescriptorBuilder::new(method, path_template.into())
	}

	/// Shorthand for a `GET` builder.
	pub fn get(path_template: impl Into<String>) -> RequestDescriptorBuilder {
		Self::builder(Method::GET, path_template)
	}

	/// Shorthand for a `POST` builder.
	pub fn post(path_template: impl Into<String>) -> RequestDescriptorBuilder {
		Self::builder(Method::POST, path_template)
	}

	/// Shorthand for a `PUT` builder.
	pub fn put(path_template: impl Into<String>) -> RequestDescriptorBuilder {
		Self::builder(Method::PUT, path_template)
	}

	/// Shorthand for a `DELETE` builder.
	pub fn delete(path_template: impl Into<String>) -> RequestDescriptorBuilder {
		Self::builder(Method::DELETE, path_template)
	}

	/// HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Path template as supplied by the caller.
	pub fn path_template(&self) -> &str {
		&self.path_template
	}

	/// Path with every placeholder substituted.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Ordered query parameters.
	pub fn query(&self) -> &[QueryParam] {
		&self.query
	}

	/// Header overrides.
	pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
		&self.headers
	}

	/// Materialized body bytes.
	pub fn body(&self) -> Option<&Bytes> {
		self.body.as_ref()
	}

	/// Per-call cache policy.
	pub fn cache_policy(&self) -> &CachePolicy {
		&self.cache
	}

	/// Returns `true` for methods that never change server state.
	pub fn is_read(&self) -> bool {
		matches!(self.method, Method::GET | Method::HEAD)
	}

	/// Resolves the absolute URL: `base` + resolved path + encoded query string.
	pub fn resolve_url(&self, base: &Url) -> Result<Url, ConfigError> {
		let mut joined = base.as_str().trim_end_matches('/').to_owned();

		if !self.path.is_empty() {
			if !self.path.starts_with('/') {
				joined.push('/');
			}

			joined.push_str(&self.path);
		}

		let mut url =
			Url::parse(&joined).map_err(|source| ConfigError::InvalidUrl { field: "request", source })?;
		let query = encode_query(&self.query);

		url.set_query(if query.is_empty() { None } else { Some(query.as_str()) });

		Ok(url)
	}

	/// Builds a fresh, independent request for one attempt.
	///
	/// Headers and body are copied out of the descriptor, so the returned request may be consumed
	/// by the transport without affecting later attempts.
	pub fn materialize(&self, url: &Url) -> Result<HttpRequest, ConfigError> {
		let mut builder = oauth2::http::Request::builder()
			.method(self.method.clone())
			.uri(url.as_str())
			.header(header::ACCEPT, HeaderValue::from_static("application/json"));

		for (name, value) in &self.headers {
			builder = builder.header(name, value);
		}

		let body = self.body.as_ref().map(|bytes| bytes.to_vec()).unwrap_or_default();

		Ok(builder.body(body)?)
	}
}

/// Cache behavior requested by a single call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CachePolicy {
	/// Reads use the connection's cache with its default TTL.
	#[default]
	Default,
	/// Reads use the cache with a call-specific TTL.
	Ttl(Duration),
	/// The call never touches the cache.
	Bypass,
}

/// Builder for [`RequestDescriptor`] values.
#[derive(Debug)]
pub struct RequestDescriptorBuilder {
	method: Method,
	path_template: String,
	path_params: Vec<(String, String)>,
	query: Vec<QueryParam>,
	headers: Vec<(String, String)>,
	body: Option<(Bytes, Option<&'static str>)>,
	cache: CachePolicy,
}
impl RequestDescriptorBuilder {
	fn new(method: Method, path_template: String) -> Self {
		Self {
			method,
			path_template,
			path_params: Vec::new(),
			query: Vec::new(),
			headers: Vec::new(),
			body: None,
			cache: CachePolicy::Default,
		}
	}

	/// Substitutes `{name}` in the path template with the URL-encoded `value`.
	pub fn path_param(mut self, name: impl Into<String>, value: impl Display) -> Self {
		self.path_params.push((name.into(), value.to_string()));

		self
	}

	/// Appends a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
		self.query.push(QueryParam::new(key, value));

		self
	}

	/// Appends a query parameter when `value` is present.
	pub fn query_opt<V>(self, key: impl Into<String>, value: Option<V>) -> Self
	where
		V: Into<QueryValue>,
	{
		match value {
			Some(value) => self.query(key, value),
			None => self,
		}
	}

	/// Appends an array parameter encoded with the given style.
	pub fn query_array<I, V>(mut self, key: impl Into<String>, values: I, style: ArrayStyle) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		self.query.push(QueryParam::array(key, values, style));

		self
	}

	/// Adds or overrides a request header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Uses pre-encoded bytes as the body.
	pub fn raw_body(mut self, bytes: impl Into<Bytes>, content_type: Option<&'static str>) -> Self {
		self.body = Some((bytes.into(), content_type));

		self
	}

	/// Encodes `value` with `codec` and uses it as the body.
	pub fn body_with<S, T>(mut self, codec: &S, value: &T) -> Result<Self>
	where
		S: ?Sized + SerializationStrategy,
		T: ?Sized + Serialize,
	{
		let bytes = codec.encode(value)?;

		self.body = Some((bytes, Some(codec.content_type())));

		Ok(self)
	}

	/// Encodes `value` as JSON and uses it as the body.
	pub fn json_body<T>(self, value: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		self.body_with(&crate::codec::JsonSerialization, value)
	}

	/// Overrides the cache TTL for this call.
	pub fn cache_ttl(mut self, ttl: Duration) -> Self {
		self.cache = CachePolicy::Ttl(ttl);

		self
	}

	/// Excludes this call from caching.
	pub fn no_cache(mut self) -> Self {
		self.cache = CachePolicy::Bypass;

		self
	}

	/// Consumes the builder and produces an immutable [`RequestDescriptor`].
	pub fn build(self) -> Result<RequestDescriptor, ConfigError> {
		let mut path = self.path_template.clone();

		for (name, value) in &self.path_params {
			path = path.replace(&format!("{{{name}}}"), &encode_component(value));
		}

		// Substituted values are percent-encoded, so any brace left is a placeholder.
		if let Some(start) = path.find('{')
			&& let Some(len) = path[start..].find('}')
		{
			return Err(ConfigError::UnresolvedPathParam {
				name: path[start + 1..start + len].to_owned(),
			});
		}

		let mut headers = Vec::with_capacity(self.headers.len() + 1);

		if let Some((_, Some(content_type))) = &self.body {
			headers.push((header::CONTENT_TYPE, HeaderValue::from_static(*content_type)));
		}
		for (name, value) in self.headers {
			let parsed_name = HeaderName::from_bytes(name.as_bytes())
				.map_err(|_| ConfigError::InvalidHeader { name: name.clone() })?;
			let parsed_value = HeaderValue::from_str(&value)
				.map_err(|_| ConfigError::InvalidHeader { name: name.clone() })?;

			headers.retain(|(existing, _)| *existing != parsed_name);
			headers.push((parsed_name, parsed_value));
		}

		Ok(RequestDescriptor {
			method: self.method,
			path_template: self.path_template,
			path,
			query: self.query,
			headers,
			body: self.body.map(|(bytes, _)| bytes),
			cache: self.cache,
		})
	}
}
