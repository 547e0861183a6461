//! Authentication strategies: attach credentials to outgoing requests and recover from
//! credential failures.
//!
//! Two variants ship with the crate. [`StaticTokenAuth`] sends a fixed token as the entire
//! `Authorization` value and can never recover. [`OAuthAuth`] sends `Bearer <access-token>`,
//! tracks expiry, and refreshes through the token endpoint behind a single-flight guard.

pub mod oauth;
pub mod static_token;
pub mod token;

pub use oauth::*;
pub use static_token::*;
pub use token::*;

// self
use crate::{
	_prelude::*,
	classify::ApiError,
	http::{HeaderMap, HeaderValue, HttpRequest},
};

/// Boxed future returned by [`AuthenticationStrategy`] methods.
pub type AuthFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Credential handling contract consumed by the connection.
///
/// Implementations own their token state exclusively; the only outward side effect of
/// [`apply_authentication`](Self::apply_authentication) is the mutation of the request headers.
pub trait AuthenticationStrategy
where
	Self: Send + Sync,
{
	/// Returns the headers that authenticate the next request, refreshing first when needed.
	fn headers(&self) -> AuthFuture<'_, HeaderMap>;

	/// Returns `true` when the held credentials look usable.
	fn validate_credentials(&self) -> bool;

	/// Exchanges refresh credentials for new ones; `false` when the strategy cannot refresh.
	fn refresh(&self) -> AuthFuture<'_, bool>;

	/// Returns `true` when the credentials expire within `buffer` from now.
	fn is_expired(&self, buffer: Duration) -> bool;

	/// Forgets every held credential.
	fn clear_credentials(&self);

	/// Reacts to an authentication failure; `true` means the caller should retry the call once.
	///
	/// `sent` is the `Authorization` value the failed request carried, so a strategy can tell a
	/// credential that was already replaced from the one it currently holds.
	fn handle_authentication_failure<'a>(
		&'a self,
		error: &'a ApiError,
		sent: Option<&'a HeaderValue>,
	) -> AuthFuture<'a, bool>;

	/// Attaches credentials to `request`, replacing any existing values of the same headers.
	fn apply_authentication<'a>(&'a self, request: &'a mut HttpRequest) -> AuthFuture<'a, ()> {
		Box::pin(async move {
			let headers = self.headers().await?;

			request.headers_mut().extend(headers);

			Ok(())
		})
	}
}
