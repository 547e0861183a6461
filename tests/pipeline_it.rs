// self
use taskpipe::{
	_preludet::*,
	auth::StaticTokenAuth,
	cache::MemoryCache,
	classify::ApiErrorKind,
	connection::Connection,
	plugin::{PipelinePlugin, PluginContext},
	request::RequestDescriptor,
	retry::{FixedDelayRetry, NoRetry, RetryContext, RetryStrategy},
};

const BASE: &str = "https://api.example.com/api/v2";

#[derive(Debug, PartialEq, Deserialize)]
struct Task {
	id: String,
	name: String,
}

#[derive(Default)]
struct Recorder {
	requests: Mutex<Vec<u32>>,
	retries: Mutex<Vec<Duration>>,
	errors: Mutex<usize>,
}
impl PipelinePlugin for Recorder {
	fn on_request(&self, _: &PluginContext<'_>, attempt: u32, _: &taskpipe::http::HttpRequest) {
		self.requests.lock().push(attempt);
	}

	fn on_retry(&self, _: &PluginContext<'_>, retry: &RetryContext<'_>) {
		self.retries.lock().push(retry.delay);
	}

	fn on_error(&self, _: &PluginContext<'_>, _: &Error) {
		*self.errors.lock() += 1;
	}
}

fn connection(
	transport: &ScriptedTransport,
	retry: Arc<dyn RetryStrategy>,
	cache: Option<Arc<MemoryCache>>,
	recorder: Option<Arc<Recorder>>,
) -> Connection {
	let mut builder = Connection::builder(BASE)
		.transport(Arc::new(transport.clone()))
		.auth(Arc::new(StaticTokenAuth::new("pk_42_SECRET")))
		.retry(retry);

	if let Some(cache) = cache {
		builder = builder.cache(cache);
	}
	if let Some(recorder) = recorder {
		builder = builder.plugin(recorder);
	}

	builder.build().expect("Connection fixture should build.")
}

fn get_task(id: &str) -> RequestDescriptor {
	RequestDescriptor::get("/task/{task_id}")
		.path_param("task_id", id)
		.build()
		.expect("Task descriptor should build.")
}

#[tokio::test]
async fn non_success_statuses_surface_as_typed_errors() {
	let table = [
		(400, ApiErrorKind::Validation),
		(401, ApiErrorKind::Authentication),
		(403, ApiErrorKind::Authentication),
		(404, ApiErrorKind::NotFound),
		(422, ApiErrorKind::Validation),
		(429, ApiErrorKind::RateLimit),
		(500, ApiErrorKind::Server),
		(502, ApiErrorKind::Server),
		(503, ApiErrorKind::Server),
		(504, ApiErrorKind::Server),
	];

	for (status, kind) in table {
		let transport = ScriptedTransport::new([ScriptedOutcome::json(status, r#"{"err":"nope","ECODE":"X_1"}"#)]);
		let err = connection(&transport, Arc::new(NoRetry), None, None)
			.send::<Task>(&get_task("abc"), &CancellationToken::new())
			.await
			.expect_err("A non-success status should fail the call.");
		let api = err.as_api().expect("A non-success status should produce an API error.");

		assert_eq!(api.kind(), kind, "status {status}");
		assert_eq!(api.status(), status);
		assert_eq!(api.code(), Some("X_1"));
		assert_eq!(transport.calls(), 1, "status {status} should not be retried without a budget");
	}
}

#[tokio::test]
async fn validation_errors_expose_field_messages() {
	let transport = ScriptedTransport::new([ScriptedOutcome::json(
		422,
		r#"{"err":"Invalid task","ECODE":"TASK_042","errors":{"name":["is required"],"due_date":["must be in the future","is malformed"]}}"#,
	)]);
	let descriptor = RequestDescriptor::post("/list/{list_id}/task")
		.path_param("list_id", 9)
		.json_body(&serde_json::json!({ "name": "" }))
		.expect("JSON body should encode.")
		.build()
		.expect("Descriptor should build.");
	let err = connection(&transport, Arc::new(FixedDelayRetry::new(3, Duration::milliseconds(1))), None, None)
		.send::<Task>(&descriptor, &CancellationToken::new())
		.await
		.expect_err("Validation failures should fail the call.");
	let api = err.as_api().expect("Validation failure should be an API error.");

	assert_eq!(api.kind(), ApiErrorKind::Validation);
	assert_eq!(api.field_errors()["name"], vec!["is required".to_string()]);
	assert_eq!(api.field_errors()["due_date"].len(), 2);
	assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn transient_server_errors_are_retried_until_success() {
	let transport = ScriptedTransport::new([
		ScriptedOutcome::status(503, ""),
		ScriptedOutcome::status(503, ""),
		ScriptedOutcome::json(200, r#"{"id":"abc","name":"Ship it"}"#),
	]);
	let recorder = Arc::new(Recorder::default());
	let task: Task = connection(
		&transport,
		Arc::new(FixedDelayRetry::new(3, Duration::milliseconds(5))),
		None,
		Some(recorder.clone()),
	)
	.send(&get_task("abc"), &CancellationToken::new())
	.await
	.expect("Third attempt should succeed.");

	assert_eq!(task, Task { id: "abc".into(), name: "Ship it".into() });
	assert_eq!(transport.calls(), 3);
	assert_eq!(*recorder.requests.lock(), vec![1, 2, 3]);
	assert_eq!(recorder.retries.lock().len(), 2);
	assert_eq!(*recorder.errors.lock(), 0);
}

#[tokio::test]
async fn exhausted_retries_return_the_last_classified_error() {
	let transport = ScriptedTransport::new([
		ScriptedOutcome::status(502, "bad gateway"),
		ScriptedOutcome::status(500, "boom"),
		ScriptedOutcome::status(504, "<html>timeout</html>"),
	]);
	let recorder = Arc::new(Recorder::default());
	let err = connection(
		&transport,
		Arc::new(FixedDelayRetry::new(2, Duration::milliseconds(1))),
		None,
		Some(recorder.clone()),
	)
	.send::<Task>(&get_task("abc"), &CancellationToken::new())
	.await
	.expect_err("Every attempt failed.");
	let api = err.as_api().expect("Exhaustion should surface the last API error.");

	assert_eq!(api.status(), 504);
	assert_eq!(api.raw_body(), b"<html>timeout</html>");
	assert_eq!(transport.calls(), 3);
	assert_eq!(*recorder.errors.lock(), 1);
}

#[tokio::test]
async fn rate_limits_honor_retry_after_over_the_strategy_delay() {
	let transport = ScriptedTransport::new([
		ScriptedOutcome::status(429, r#"{"err":"slow down"}"#).with_header("retry-after", "1"),
		ScriptedOutcome::json(200, r#"{"id":"abc","name":"Ship it"}"#),
	]);
	let recorder = Arc::new(Recorder::default());
	let strategy = FixedDelayRetry::new(1, Duration::milliseconds(10)).with_jitter(false);

	connection(&transport, Arc::new(strategy), None, Some(recorder.clone()))
		.send::<Task>(&get_task("abc"), &CancellationToken::new())
		.await
		.expect("Call should succeed after the advertised wait.");

	assert_eq!(*recorder.retries.lock(), vec![Duration::seconds(1)]);
}

#[tokio::test]
async fn rate_limits_without_retry_after_use_the_strategy_delay() {
	let transport = ScriptedTransport::new([
		ScriptedOutcome::status(429, ""),
		ScriptedOutcome::json(200, r#"{"id":"abc","name":"Ship it"}"#),
	]);
	let recorder = Arc::new(Recorder::default());
	let strategy = FixedDelayRetry::new(1, Duration::milliseconds(10)).with_jitter(false);

	connection(&transport, Arc::new(strategy), None, Some(recorder.clone()))
		.send::<Task>(&get_task("abc"), &CancellationToken::new())
		.await
		.expect("Call should succeed after the strategy delay.");

	assert_eq!(*recorder.retries.lock(), vec![Duration::milliseconds(10)]);
}

#[tokio::test]
async fn transport_failures_are_retried() {
	let transport = ScriptedTransport::new([
		ScriptedOutcome::Fail(TransportError::Timeout),
		ScriptedOutcome::json(200, r#"{"id":"abc","name":"Ship it"}"#),
	]);
	let task: Task =
		connection(&transport, Arc::new(FixedDelayRetry::new(1, Duration::milliseconds(1))), None, None)
			.send(&get_task("abc"), &CancellationToken::new())
			.await
			.expect("Second attempt should succeed.");

	assert_eq!(task.id, "abc");
	assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn static_tokens_are_sent_verbatim() {
	let transport = ScriptedTransport::new([ScriptedOutcome::json(200, r#"{"id":"abc","name":"Ship it"}"#)]);

	connection(&transport, Arc::new(NoRetry), None, None)
		.send::<Task>(&get_task("abc"), &CancellationToken::new())
		.await
		.expect("Call should succeed.");

	assert_eq!(authorization_of(&transport.requests()[0]).as_deref(), Some("pk_42_SECRET"));
}

#[tokio::test]
async fn cancellation_during_backoff_stops_further_attempts() {
	let transport = ScriptedTransport::new([
		ScriptedOutcome::status(503, ""),
		ScriptedOutcome::json(200, r#"{"id":"abc","name":"Ship it"}"#),
	]);
	let connection =
		connection(&transport, Arc::new(FixedDelayRetry::new(3, Duration::seconds(5))), None, None);
	let cancellation = CancellationToken::new();
	let trigger = cancellation.clone();

	tokio::spawn(async move {
		tokio::time::sleep(std::time::Duration::from_millis(50)).await;
		trigger.cancel();
	});

	let started = std::time::Instant::now();
	let err = connection
		.send::<Task>(&get_task("abc"), &cancellation)
		.await
		.expect_err("Cancelled calls should fail.");

	assert!(matches!(err, Error::Cancelled));
	assert!(started.elapsed() < std::time::Duration::from_secs(2));
	assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn cancellation_before_dispatch_sends_nothing() {
	let transport = ScriptedTransport::default();
	let cancellation = CancellationToken::new();

	cancellation.cancel();

	let err = connection(&transport, Arc::new(NoRetry), None, None)
		.send::<Task>(&get_task("abc"), &cancellation)
		.await
		.expect_err("A pre-cancelled call should fail.");

	assert!(matches!(err, Error::Cancelled));
	assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn cached_reads_skip_the_transport_until_expiry() {
	let transport = ScriptedTransport::new([
		ScriptedOutcome::json(200, r#"{"id":"abc","name":"v1"}"#),
		ScriptedOutcome::json(200, r#"{"id":"abc","name":"v2"}"#),
	]);
	let cache = Arc::new(MemoryCache::new(Duration::milliseconds(100)));
	let connection = connection(&transport, Arc::new(NoRetry), Some(cache.clone()), None);
	let first: Task = connection
		.send(&get_task("abc"), &CancellationToken::new())
		.await
		.expect("First read should succeed.");
	let second: Task = connection
		.send(&get_task("abc"), &CancellationToken::new())
		.await
		.expect("Second read should be served from the cache.");

	assert_eq!(first, second);
	assert_eq!(transport.calls(), 1);
	assert_eq!(cache.stats().hits, 1);

	tokio::time::sleep(std::time::Duration::from_millis(150)).await;

	let third: Task = connection
		.send(&get_task("abc"), &CancellationToken::new())
		.await
		.expect("Read after expiry should reach the transport.");

	assert_eq!(third.name, "v2");
	assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn bypass_and_errors_never_populate_the_cache() {
	let transport = ScriptedTransport::new([
		ScriptedOutcome::status(404, ""),
		ScriptedOutcome::json(200, r#"{"id":"abc","name":"v1"}"#),
		ScriptedOutcome::json(200, r#"{"id":"abc","name":"v2"}"#),
	]);
	let cache = Arc::new(MemoryCache::new(Duration::minutes(5)));
	let connection = connection(&transport, Arc::new(NoRetry), Some(cache.clone()), None);
	let uncached = RequestDescriptor::get("/task/{task_id}")
		.path_param("task_id", "abc")
		.no_cache()
		.build()
		.expect("Descriptor should build.");

	connection
		.send::<Task>(&get_task("abc"), &CancellationToken::new())
		.await
		.expect_err("404 should fail.");
	connection
		.send::<Task>(&uncached, &CancellationToken::new())
		.await
		.expect("Bypassing read should succeed.");

	assert_eq!(cache.stats().entries, 0);

	let task: Task = connection
		.send(&get_task("abc"), &CancellationToken::new())
		.await
		.expect("Cacheable read should reach the transport.");

	assert_eq!(task.name, "v2");
	assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn writes_invalidate_cached_reads_of_the_same_resource() {
	let transport = ScriptedTransport::new([
		ScriptedOutcome::json(200, r#"{"id":"abc","name":"v1"}"#),
		ScriptedOutcome::json(200, r#"{"id":"xyz","name":"other"}"#),
		ScriptedOutcome::json(200, r#"{"id":"abc","name":"v2"}"#),
		ScriptedOutcome::json(200, r#"{"id":"abc","name":"v2"}"#),
	]);
	let cache = Arc::new(MemoryCache::new(Duration::minutes(5)));
	let connection = connection(&transport, Arc::new(NoRetry), Some(cache.clone()), None);

	for id in ["abc", "xyz"] {
		connection
			.send::<Task>(&get_task(id), &CancellationToken::new())
			.await
			.expect("Warm-up read should succeed.");
	}

	let update = RequestDescriptor::put("/task/{task_id}")
		.path_param("task_id", "abc")
		.json_body(&serde_json::json!({ "name": "v2" }))
		.expect("JSON body should encode.")
		.build()
		.expect("Update descriptor should build.");

	connection
		.send::<Task>(&update, &CancellationToken::new())
		.await
		.expect("Update should succeed.");

	assert_eq!(cache.stats().entries, 1);

	let refreshed: Task = connection
		.send(&get_task("abc"), &CancellationToken::new())
		.await
		.expect("Read after write should reach the transport.");

	assert_eq!(refreshed.name, "v2");
	assert_eq!(transport.calls(), 4);
}
