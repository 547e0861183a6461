//! Credential values held by authentication strategies.

// self
use crate::{_prelude::*, error::ConfigError};

/// Redacted secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` for an empty secret.
	pub fn is_empty(&self) -> bool {
		self.0.trim().is_empty()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Access credential plus optional refresh credential and absolute expiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
	/// Credential sent with every request.
	pub access_token: TokenSecret,
	/// Credential exchanged for a new access token.
	pub refresh_token: Option<TokenSecret>,
	/// Instant after which the access token is no longer accepted; `None` never expires.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub expires_at: Option<OffsetDateTime>,
}
impl AuthToken {
	/// Creates a non-expiring token without refresh credentials.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self { access_token: TokenSecret::new(access_token), refresh_token: None, expires_at: None }
	}

	/// Attaches a refresh credential.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(refresh_token));

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets the expiry relative to now.
	///
	/// Fails when the resulting instant falls outside the representable calendar range.
	pub fn expires_in(self, duration: Duration) -> Result<Self, ConfigError> {
		let instant = OffsetDateTime::now_utc()
			.checked_add(duration)
			.ok_or(ConfigError::ExpiresInOutOfRange)?;

		Ok(self.expires_at(instant))
	}

	/// Returns `true` when `instant + buffer` has reached the expiry.
	///
	/// A buffer reaching past the end of the calendar covers every expiry.
	pub fn expires_within(&self, instant: OffsetDateTime, buffer: Duration) -> bool {
		self.expires_at.is_some_and(|expires_at| {
			instant.checked_add(buffer).is_none_or(|deadline| deadline >= expires_at)
		})
	}

	/// Returns `true` when a refresh credential is present.
	pub fn can_refresh(&self) -> bool {
		self.refresh_token.as_ref().is_some_and(|secret| !secret.is_empty())
	}
}
