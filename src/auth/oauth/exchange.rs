//! Token endpoint exchange running over the pipeline's own transport.

// crates.io
use oauth2::{
	AsyncHttpClient, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::AuthToken,
	error::{CodecError, ConfigError},
	http::{HttpRequest, HttpResponse, HttpTransport},
};

pub(super) type TokenClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

type ExchangeFuture<'c> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, HttpClientError<TransportError>>> + 'c + Send>>;

/// Adapts an [`HttpTransport`] to the `oauth2` crate's async client contract.
pub(super) struct TransportHttpClient<'t>(pub(super) &'t dyn HttpTransport);
impl<'c> AsyncHttpClient<'c> for TransportHttpClient<'_> {
	type Error = HttpClientError<TransportError>;
	type Future = ExchangeFuture<'c>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.0.execute(request).await.map_err(|e| HttpClientError::Reqwest(Box::new(e)))
		})
	}
}

pub(super) fn build_client(
	client_id: &str,
	client_secret: Option<&str>,
	token_url: &Url,
) -> Result<TokenClient, ConfigError> {
	let token_url = TokenUrl::new(token_url.to_string())
		.map_err(|source| ConfigError::InvalidUrl { field: "token", source })?;
	let mut client = BasicClient::new(ClientId::new(client_id.to_owned())).set_token_uri(token_url);

	if let Some(secret) = client_secret {
		client = client.set_client_secret(ClientSecret::new(secret.to_owned()));
	}

	Ok(client)
}

/// Exchanges `refresh_token` for a new token, keeping the old refresh credential when the
/// endpoint does not rotate it.
pub(super) async fn refresh_token(
	client: &TokenClient,
	transport: &dyn HttpTransport,
	refresh_token: &str,
) -> Result<AuthToken> {
	let http_client = TransportHttpClient(transport);
	let secret = RefreshToken::new(refresh_token.to_owned());
	let response = client
		.exchange_refresh_token(&secret)
		.request_async(&http_client)
		.await
		.map_err(map_request_error)?;

	map_token_response(response, refresh_token)
}

fn map_token_response(response: BasicTokenResponse, previous_refresh: &str) -> Result<AuthToken> {
	let mut token = AuthToken::new(response.access_token().secret().to_owned()).with_refresh_token(
		response
			.refresh_token()
			.map(|secret| secret.secret().to_owned())
			.unwrap_or_else(|| previous_refresh.to_owned()),
	);

	if let Some(expires_in) = response.expires_in() {
		let secs =
			i64::try_from(expires_in.as_secs()).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

		token = token.expires_in(Duration::seconds(secs))?;
	}

	Ok(token)
}

fn map_request_error(err: BasicRequestTokenError<HttpClientError<TransportError>>) -> Error {
	match err {
		RequestTokenError::ServerResponse(response) => {
			let reason = match response.error_description() {
				Some(description) => format!("{}: {description}", response.error().as_ref()),
				None => response.error().as_ref().to_owned(),
			};

			Error::Refresh { reason }
		},
		RequestTokenError::Request(error) => match error {
			HttpClientError::Reqwest(inner) => Error::Transport(*inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => Error::Refresh { reason: message },
			_ => Error::Refresh { reason: "token endpoint client failed".into() },
		},
		RequestTokenError::Parse(error, _body) => CodecError::decode("json", error).into(),
		RequestTokenError::Other(message) =>
			Error::Refresh { reason: format!("unexpected token endpoint response: {message}") },
	}
}
