//! Fixed-token authentication.

// self
use crate::{
	_prelude::*,
	auth::{AuthFuture, AuthenticationStrategy, TokenSecret},
	classify::ApiError,
	error::ConfigError,
	http::{HeaderMap, HeaderValue, header},
};

/// Sends a fixed token as the entire `Authorization` value (no scheme prefix).
///
/// The token never expires and cannot be refreshed, so every authentication failure is terminal.
#[derive(Debug)]
pub struct StaticTokenAuth {
	token: RwLock<Option<TokenSecret>>,
}
impl StaticTokenAuth {
	/// Creates a strategy for `token`.
	pub fn new(token: impl Into<String>) -> Self {
		Self { token: RwLock::new(Some(TokenSecret::new(token))) }
	}
}
impl AuthenticationStrategy for StaticTokenAuth {
	fn headers(&self) -> AuthFuture<'_, HeaderMap> {
		Box::pin(async move {
			let token = self
				.token
				.read()
				.clone()
				.filter(|token| !token.is_empty())
				.ok_or(ConfigError::MissingCredentials)?;
			let mut value = HeaderValue::from_str(token.expose())
				.map_err(|_| ConfigError::InvalidHeader { name: header::AUTHORIZATION.to_string() })?;

			value.set_sensitive(true);

			let mut headers = HeaderMap::new();

			headers.insert(header::AUTHORIZATION, value);

			Ok(headers)
		})
	}

	fn validate_credentials(&self) -> bool {
		self.token.read().as_ref().is_some_and(|token| !token.is_empty())
	}

	fn refresh(&self) -> AuthFuture<'_, bool> {
		Box::pin(async { Ok(false) })
	}

	fn is_expired(&self, _buffer: Duration) -> bool {
		!self.validate_credentials()
	}

	fn clear_credentials(&self) {
		*self.token.write() = None;
	}

	fn handle_authentication_failure<'a>(
		&'a self,
		_error: &'a ApiError,
		_sent: Option<&'a HeaderValue>,
	) -> AuthFuture<'a, bool> {
		Box::pin(async { Ok(false) })
	}
}
