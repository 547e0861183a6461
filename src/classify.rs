//! Error classification: maps an HTTP status plus the raw error body onto a closed set of typed
//! API errors.
//!
//! Structured bodies follow the `{ "err": .., "ECODE": .., "errors": { field: [..] } }` shape; any
//! subset may be missing. The raw body is always preserved verbatim, so callers can inspect
//! payloads the classifier did not understand.

// std
use std::borrow::Cow;
// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	http::{HttpResponse, StatusCode, parse_retry_after},
};

/// Field name mapped to its ordered validation messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Coarse classification of an API failure, derived from the HTTP status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
	/// 400 and 422.
	Validation,
	/// 401 and 403.
	Authentication,
	/// 404.
	NotFound,
	/// 429.
	RateLimit,
	/// 500, 502, 503, and 504.
	Server,
	/// Any other non-success status.
	Generic,
}
impl ApiErrorKind {
	/// Maps an HTTP status code onto its kind.
	pub const fn from_status(status: u16) -> Self {
		match status {
			400 | 422 => Self::Validation,
			401 | 403 => Self::Authentication,
			404 => Self::NotFound,
			429 => Self::RateLimit,
			500 | 502 | 503 | 504 => Self::Server,
			_ => Self::Generic,
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Validation => "validation",
			Self::Authentication => "authentication",
			Self::NotFound => "not_found",
			Self::RateLimit => "rate_limit",
			Self::Server => "server",
			Self::Generic => "generic",
		}
	}
}
impl Display for ApiErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Everything the remote side told us about a failed call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorEnvelope {
	/// HTTP status code of the response.
	pub status: u16,
	/// Vendor error code (`ECODE`), when the body carried one.
	pub code: Option<String>,
	/// Human-readable message; synthesized from the status text when the body has none.
	pub message: String,
	/// Response body exactly as received, byte for byte.
	pub raw_body: Bytes,
	/// Field-level validation messages; empty when the body exposes none.
	pub field_errors: FieldErrors,
}
impl ErrorEnvelope {
	/// Builds an envelope by parsing `body` as a structured error payload when possible.
	pub fn parse(status: u16, body: &[u8]) -> Self {
		let raw_body = Bytes::copy_from_slice(body);
		let status_text = status_text(status);
		let parsed = if body.trim_ascii().is_empty() {
			None
		} else {
			serde_json::from_slice::<Value>(body).ok().filter(Value::is_object)
		};
		let Some(value) = parsed else {
			return Self {
				status,
				code: None,
				message: status_text,
				raw_body,
				field_errors: FieldErrors::new(),
			};
		};
		let message = ["err", "message", "error"]
			.iter()
			.find_map(|key| value.get(key).and_then(Value::as_str))
			.map(str::to_owned)
			.unwrap_or(status_text);
		let code = value.get("ECODE").and_then(|code| match code {
			Value::String(s) => Some(s.clone()),
			Value::Number(n) => Some(n.to_string()),
			_ => None,
		});
		let field_errors = value.get("errors").map(parse_field_errors).unwrap_or_default();

		Self { status, code, message, raw_body, field_errors }
	}

	/// Body decoded as UTF-8 for display; invalid sequences become U+FFFD.
	pub fn raw_body_text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.raw_body)
	}
}

/// Typed API failure; callers pattern-match on the variant instead of inspecting messages.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ApiError {
	/// Request was rejected as invalid (400/422).
	#[error("Request validation failed with status {}: {}.", .envelope.status, .envelope.message)]
	Validation {
		/// Response details.
		envelope: ErrorEnvelope,
	},
	/// Credentials are invalid, expired, or forbidden (401/403).
	#[error("Authentication failed with status {}: {}.", .envelope.status, .envelope.message)]
	Authentication {
		/// Response details.
		envelope: ErrorEnvelope,
	},
	/// Resource does not exist (404).
	#[error("Resource not found: {}.", .envelope.message)]
	NotFound {
		/// Response details.
		envelope: ErrorEnvelope,
	},
	/// Rate limit exceeded (429).
	#[error("Rate limit exceeded: {}.", .envelope.message)]
	RateLimit {
		/// Response details.
		envelope: ErrorEnvelope,
		/// Server-provided wait before the next attempt, if any.
		retry_after: Option<Duration>,
	},
	/// Server-side failure (5xx).
	#[error("Server error with status {}: {}.", .envelope.status, .envelope.message)]
	Server {
		/// Response details.
		envelope: ErrorEnvelope,
	},
	/// Any other non-success response.
	#[error("Request failed with status {}: {}.", .envelope.status, .envelope.message)]
	Generic {
		/// Response details.
		envelope: ErrorEnvelope,
	},
}
impl ApiError {
	/// Returns the coarse kind of this error.
	pub fn kind(&self) -> ApiErrorKind {
		match self {
			Self::Validation { .. } => ApiErrorKind::Validation,
			Self::Authentication { .. } => ApiErrorKind::Authentication,
			Self::NotFound { .. } => ApiErrorKind::NotFound,
			Self::RateLimit { .. } => ApiErrorKind::RateLimit,
			Self::Server { .. } => ApiErrorKind::Server,
			Self::Generic { .. } => ApiErrorKind::Generic,
		}
	}

	/// Returns the response details.
	pub fn envelope(&self) -> &ErrorEnvelope {
		match self {
			Self::Validation { envelope }
			| Self::Authentication { envelope }
			| Self::NotFound { envelope }
			| Self::RateLimit { envelope, .. }
			| Self::Server { envelope }
			| Self::Generic { envelope } => envelope,
		}
	}

	/// HTTP status of the failed response.
	pub fn status(&self) -> u16 {
		self.envelope().status
	}

	/// Vendor error code, if the body carried one.
	pub fn code(&self) -> Option<&str> {
		self.envelope().code.as_deref()
	}

	/// Verbatim response body.
	pub fn raw_body(&self) -> &[u8] {
		&self.envelope().raw_body
	}

	/// Response body as lossily decoded text.
	pub fn raw_body_text(&self) -> Cow<'_, str> {
		self.envelope().raw_body_text()
	}

	/// Field-level validation messages (empty unless the body exposed an `errors` map).
	pub fn field_errors(&self) -> &FieldErrors {
		&self.envelope().field_errors
	}

	/// Server-provided retry delay; only rate-limit errors carry one.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::RateLimit { retry_after, .. } => *retry_after,
			_ => None,
		}
	}
}

/// Classifies a failed response using its status, `Retry-After` header, and body.
pub fn classify(response: &HttpResponse) -> ApiError {
	classify_response(
		response.status().as_u16(),
		parse_retry_after(response.headers()),
		response.body(),
	)
}

/// Classifies a failed response from its already extracted parts.
pub fn classify_response(status: u16, retry_after: Option<Duration>, body: &[u8]) -> ApiError {
	let envelope = ErrorEnvelope::parse(status, body);

	match ApiErrorKind::from_status(status) {
		ApiErrorKind::Validation => ApiError::Validation { envelope },
		ApiErrorKind::Authentication => ApiError::Authentication { envelope },
		ApiErrorKind::NotFound => ApiError::NotFound { envelope },
		ApiErrorKind::RateLimit => ApiError::RateLimit { envelope, retry_after },
		ApiErrorKind::Server => ApiError::Server { envelope },
		ApiErrorKind::Generic => ApiError::Generic { envelope },
	}
}

fn parse_field_errors(value: &Value) -> FieldErrors {
	let Some(map) = value.as_object() else {
		return FieldErrors::new();
	};

	map.iter()
		.map(|(field, messages)| {
			let messages = match messages {
				Value::Array(items) => items
					.iter()
					.map(|item| match item {
						Value::String(s) => s.clone(),
						other => other.to_string(),
					})
					.collect(),
				Value::String(s) => vec![s.clone()],
				Value::Null => Vec::new(),
				other => vec![other.to_string()],
			};

			(field.clone(), messages)
		})
		.collect()
}

fn status_text(status: u16) -> String {
	StatusCode::from_u16(status)
		.ok()
		.and_then(|code| code.canonical_reason())
		.map(str::to_owned)
		.unwrap_or_else(|| format!("HTTP {status}"))
}
