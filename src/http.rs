//! Transport primitives for pipeline calls.
//!
//! [`HttpTransport`] is the pipeline's only dependency on an HTTP stack. The connection hands it a
//! fully materialized [`HttpRequest`] per attempt and receives the complete [`HttpResponse`]
//! (status, headers, buffered body) regardless of status; classification happens upstream.

pub use oauth2::{
	HttpRequest, HttpResponse,
	http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
};

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing one request attempt.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared across
/// connections and the OAuth refresh exchange. Non-success statuses are *not* errors at this
/// layer; only failures to obtain a response are.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and buffers the full response.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Starts an [`HttpResponse`] builder.
pub fn response_builder() -> oauth2::http::response::Builder {
	oauth2::http::Response::builder()
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client whose every request is bounded by `timeout`.
	pub fn with_timeout(timeout: Duration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().timeout(timeout.unsigned_abs()).build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request).map_err(TransportError::network)?;
			let response = client.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();
			let mut converted = HttpResponse::new(body);

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

/// Parses a `Retry-After` header expressed as delta-seconds or an HTTP date.
///
/// Dates already in the past resolve to a zero wait.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(header::RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		return Some(if delta.is_positive() { delta } else { Duration::ZERO });
	}

	None
}
