//! Pipeline-level error types shared across transports, strategies, and the connection.

// self
use crate::{_prelude::*, classify::ApiError};

/// Pipeline-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical pipeline error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The remote API answered with a non-success status.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Payload could not be encoded or decoded.
	#[error(transparent)]
	Codec(#[from] CodecError),
	/// Cache backend failure.
	#[error(transparent)]
	Cache(#[from] CacheError),

	/// Token endpoint rejected a refresh exchange.
	#[error("Token refresh failed: {reason}.")]
	Refresh {
		/// Provider- or pipeline-supplied reason string.
		reason: String,
	},
	/// The caller cancelled the call.
	#[error("The call was cancelled.")]
	Cancelled,
}
impl Error {
	/// Returns `true` when the failure is transient and another attempt may succeed.
	///
	/// API errors are judged by their HTTP status inside the retry strategy instead.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Transport(_))
	}

	/// Returns the typed API error, if this is one.
	pub fn as_api(&self) -> Option<&ApiError> {
		match self {
			Self::Api(e) => Some(e),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised while wiring a connection.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A configured URL cannot be parsed.
	#[error("The {field} URL is invalid.")]
	InvalidUrl {
		/// Which option carried the URL.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A header name or value is not valid HTTP.
	#[error("Header `{name}` is invalid.")]
	InvalidHeader {
		/// Offending header name.
		name: String,
	},

	/// No base address was supplied.
	#[error("A base URL is required.")]
	MissingBaseUrl,
	/// Neither a static token nor OAuth credentials were supplied.
	#[error("Either a static token or OAuth credentials must be configured.")]
	MissingCredentials,
	/// No transport was supplied and the `reqwest` feature is disabled.
	#[error("An HTTP transport is required.")]
	MissingTransport,
	/// A path template placeholder was left without a value.
	#[error("Path parameter `{name}` was not supplied.")]
	UnresolvedPathParam {
		/// Placeholder name, without braces.
		name: String,
	},
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete within the configured timeout.
	#[error("The request timed out.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

/// Encoding and decoding failures raised by serialization strategies.
#[derive(Debug, ThisError)]
pub enum CodecError {
	/// A value could not be encoded into the wire format.
	#[error("Failed to encode a {format} payload.")]
	Encode {
		/// Wire format label.
		format: &'static str,
		/// Underlying serializer failure.
		#[source]
		source: BoxError,
	},
	/// A payload could not be decoded from the wire format.
	#[error("Failed to decode a {format} payload.")]
	Decode {
		/// Wire format label.
		format: &'static str,
		/// Underlying deserializer failure.
		#[source]
		source: BoxError,
	},
}
impl CodecError {
	/// Wraps an encoder failure.
	pub fn encode(format: &'static str, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Encode { format, source: Box::new(src) }
	}

	/// Wraps a decoder failure.
	pub fn decode(format: &'static str, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Decode { format, source: Box::new(src) }
	}
}

/// Error type produced by cache strategies and distributed stores.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CacheError {
	/// The backend does not implement the requested operation.
	#[error("Cache backend does not support {operation}.")]
	Unsupported {
		/// Operation label.
		operation: &'static str,
	},
	/// A removal pattern could not be compiled.
	#[error("Invalid cache key pattern `{pattern}`.")]
	InvalidPattern {
		/// Offending pattern.
		pattern: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
