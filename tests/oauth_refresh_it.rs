// self
use taskpipe::{
	_preludet::*,
	auth::{AuthToken, AuthenticationStrategy, OAuthAuth, OAuthCredentials},
	classify::ApiErrorKind,
	connection::Connection,
	obs::RefreshOutcome,
	request::RequestDescriptor,
	retry::NoRetry,
};

const TOKEN_URL: &str = "https://auth.example.com/oauth/token";
const FRESH_TOKEN: &str =
	r#"{"access_token":"fresh","token_type":"bearer","expires_in":3600,"refresh_token":"r2"}"#;
const USER: &str = r#"{"user":{"id":7,"username":"ada"}}"#;

#[derive(Debug, Deserialize)]
struct UserEnvelope {
	user: User,
}

#[derive(Debug, Deserialize)]
struct User {
	id: u64,
}

fn oauth(transport: &ScriptedTransport, token: AuthToken) -> Arc<OAuthAuth> {
	let credentials = OAuthCredentials {
		client_id: "client".into(),
		client_secret: Some("secret".into()),
		token_url: Url::parse(TOKEN_URL).expect("Token URL fixture should parse."),
	};

	Arc::new(
		OAuthAuth::new(credentials, token, Arc::new(transport.clone()))
			.expect("OAuth strategy should build."),
	)
}

fn connection(transport: &ScriptedTransport, auth: Arc<OAuthAuth>) -> Connection {
	Connection::builder("https://api.example.com/api/v2")
		.transport(Arc::new(transport.clone()))
		.auth(auth)
		.retry(Arc::new(NoRetry))
		.build()
		.expect("Connection fixture should build.")
}

fn long_lived(access: &str) -> AuthToken {
	AuthToken::new(access)
		.with_refresh_token("r1")
		.expires_in(Duration::hours(1))
		.expect("Expiry fixture should be representable.")
}

fn user() -> RequestDescriptor {
	RequestDescriptor::get("/user").build().expect("User descriptor should build.")
}

#[tokio::test]
async fn unauthorized_calls_refresh_once_and_replay() {
	let transport = ScriptedTransport::new([
		ScriptedOutcome::json(401, r#"{"err":"Token invalid","ECODE":"OAUTH_025"}"#),
		ScriptedOutcome::json(200, FRESH_TOKEN),
		ScriptedOutcome::json(200, USER),
	]);
	let auth = oauth(&transport, long_lived("stale"));
	let envelope: UserEnvelope = connection(&transport, auth.clone())
		.send(&user(), &CancellationToken::new())
		.await
		.expect("Replayed call should succeed with the refreshed token.");
	let requests = transport.requests();

	assert_eq!(envelope.user.id, 7);
	assert_eq!(transport.calls(), 3);
	assert_eq!(authorization_of(&requests[0]).as_deref(), Some("Bearer stale"));
	assert_eq!(requests[1].uri().to_string(), TOKEN_URL);
	assert_eq!(authorization_of(&requests[2]).as_deref(), Some("Bearer fresh"));
	assert_eq!(auth.refresh_counters().count(RefreshOutcome::Success), 1);

	let token = auth.token().expect("Refreshed token should be stored.");

	assert_eq!(token.refresh_token.as_ref().map(|secret| secret.expose()), Some("r2"));
}

#[tokio::test]
async fn a_second_unauthorized_response_is_not_refreshed_again() {
	let transport = ScriptedTransport::new([
		ScriptedOutcome::status(401, ""),
		ScriptedOutcome::json(200, FRESH_TOKEN),
		ScriptedOutcome::status(401, ""),
	]);
	let auth = oauth(&transport, long_lived("stale"));
	let err = connection(&transport, auth.clone())
		.send::<UserEnvelope>(&user(), &CancellationToken::new())
		.await
		.expect_err("A replayed call that fails again should surface the error.");

	assert_eq!(err.as_api().map(|api| api.kind()), Some(ApiErrorKind::Authentication));
	assert_eq!(transport.calls(), 3);
	assert_eq!(auth.refresh_counters().count(RefreshOutcome::Attempt), 1);
}

#[tokio::test]
async fn rejected_refresh_surfaces_the_unauthorized_response() {
	let transport = ScriptedTransport::new([
		ScriptedOutcome::json(401, r#"{"err":"Token invalid"}"#),
		ScriptedOutcome::json(400, r#"{"error":"invalid_grant","error_description":"revoked"}"#),
	]);
	let auth = oauth(&transport, long_lived("stale"));
	let err = connection(&transport, auth.clone())
		.send::<UserEnvelope>(&user(), &CancellationToken::new())
		.await
		.expect_err("A rejected refresh should fail the call.");
	let api = err.as_api().expect("The 401 that triggered the refresh should be returned.");

	assert_eq!(api.status(), 401);
	assert_eq!(api.envelope().message, "Token invalid");
	assert_eq!(transport.calls(), 2);
	assert_eq!(auth.refresh_counters().count(RefreshOutcome::Failure), 1);
}

#[tokio::test]
async fn forbidden_responses_never_trigger_a_refresh() {
	let transport = ScriptedTransport::new([ScriptedOutcome::json(403, r#"{"err":"Forbidden"}"#)]);
	let auth = oauth(&transport, long_lived("valid"));
	let err = connection(&transport, auth.clone())
		.send::<UserEnvelope>(&user(), &CancellationToken::new())
		.await
		.expect_err("403 should fail the call.");

	assert_eq!(err.as_api().map(|api| api.status()), Some(403));
	assert_eq!(transport.calls(), 1);
	assert_eq!(auth.refresh_counters().count(RefreshOutcome::Attempt), 0);
}

#[tokio::test]
async fn tokens_inside_the_expiry_buffer_refresh_before_dispatch() {
	let transport = ScriptedTransport::new([
		ScriptedOutcome::json(200, FRESH_TOKEN),
		ScriptedOutcome::json(200, USER),
	]);
	let expiring = AuthToken::new("expiring")
		.with_refresh_token("r1")
		.expires_in(Duration::seconds(30))
		.expect("Expiry fixture should be representable.");
	let auth = oauth(&transport, expiring);

	assert!(auth.is_expired(OAuthAuth::DEFAULT_EXPIRY_BUFFER));

	connection(&transport, auth.clone())
		.send::<UserEnvelope>(&user(), &CancellationToken::new())
		.await
		.expect("Proactively refreshed call should succeed.");

	let requests = transport.requests();

	assert_eq!(requests[0].uri().to_string(), TOKEN_URL);
	assert_eq!(authorization_of(&requests[1]).as_deref(), Some("Bearer fresh"));
	assert!(!auth.is_expired(OAuthAuth::DEFAULT_EXPIRY_BUFFER));
}

#[tokio::test]
async fn overlapping_unauthorized_calls_share_one_refresh() {
	let transport = ScriptedTransport::new([
		ScriptedOutcome::json(401, r#"{"err":"Token invalid"}"#).after(Duration::milliseconds(20)),
		ScriptedOutcome::json(401, r#"{"err":"Token invalid"}"#).after(Duration::milliseconds(80)),
		ScriptedOutcome::json(200, FRESH_TOKEN),
		ScriptedOutcome::json(200, USER),
		ScriptedOutcome::json(200, USER),
	]);
	let auth = oauth(&transport, long_lived("stale"));
	let connection = connection(&transport, auth.clone());
	let (first_request, second_request) = (user(), user());
	let (first_cancel, second_cancel) = (CancellationToken::new(), CancellationToken::new());
	let (first, second) = tokio::join!(
		connection.send::<UserEnvelope>(&first_request, &first_cancel),
		connection.send::<UserEnvelope>(&second_request, &second_cancel),
	);

	first.expect("First call should succeed after the refresh.");
	second.expect("Second call should reuse the refreshed token.");

	let requests = transport.requests();
	let token_exchanges =
		requests.iter().filter(|request| request.uri().to_string() == TOKEN_URL).count();

	assert_eq!(token_exchanges, 1);
	assert_eq!(auth.refresh_counters().count(RefreshOutcome::Attempt), 1);
	assert_eq!(auth.refresh_counters().count(RefreshOutcome::Reused), 1);
	assert_eq!(authorization_of(&requests[1]).as_deref(), Some("Bearer stale"));
	assert_eq!(authorization_of(&requests[4]).as_deref(), Some("Bearer fresh"));
}
