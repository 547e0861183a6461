#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use taskpipe::{
	_preludet::*, classify::ApiErrorKind, codec::WireFormat, config::ClientOptions,
	connection::Connection, request::RequestDescriptor,
};

#[derive(Debug, PartialEq, Deserialize)]
struct Task {
	id: String,
	name: String,
}

fn options(value: serde_json::Value) -> ClientOptions {
	serde_json::from_value(value).expect("Options fixture should deserialize.")
}

fn get_task(id: &str) -> RequestDescriptor {
	RequestDescriptor::get("/task/{task_id}")
		.path_param("task_id", id)
		.query("include_subtasks", true)
		.build()
		.expect("Task descriptor should build.")
}

#[tokio::test]
async fn options_wire_a_cached_static_token_connection() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v2/task/abc")
				.query_param("include_subtasks", "true")
				.header("authorization", "pk_1_SECRET");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"id":"abc","name":"Ship it"}"#);
		})
		.await;
	let connection = Connection::from_options(&options(serde_json::json!({
		"base_url": server.url("/api/v2"),
		"static_token": "pk_1_SECRET",
		"cache": { "enabled": true, "default_ttl_ms": 60000 },
		"retry": { "max_retries": 2, "delay_ms": 10, "backoff": "fixed" },
		"timeout_ms": 5000
	})))
	.expect("Connection should build from options.");

	for _ in 0..2 {
		let task: Task = connection
			.send(&get_task("abc"), &CancellationToken::new())
			.await
			.expect("Task read should succeed.");

		assert_eq!(task, Task { id: "abc".into(), name: "Ship it".into() });
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn not_found_responses_are_classified() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/task/missing");
			then.status(404)
				.header("content-type", "application/json")
				.body(r#"{"err":"Task not found","ECODE":"ITEM_013"}"#);
		})
		.await;
	let connection = Connection::from_options(&options(serde_json::json!({
		"base_url": server.url("/api/v2"),
		"static_token": "pk_1_SECRET"
	})))
	.expect("Connection should build from options.");
	let err = connection
		.send::<Task>(&get_task("missing"), &CancellationToken::new())
		.await
		.expect_err("Missing task should fail.");
	let api = err.as_api().expect("404 should be an API error.");

	assert_eq!(api.kind(), ApiErrorKind::NotFound);
	assert_eq!(api.code(), Some("ITEM_013"));
	assert_eq!(api.envelope().message, "Task not found");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn xml_wire_format_decodes_xml_bodies() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/task/abc");
			then.status(200)
				.header("content-type", "application/xml")
				.body("<task><id>abc</id><name>Ship it</name></task>");
		})
		.await;
	let connection = Connection::from_options(&options(serde_json::json!({
		"base_url": server.url("/api/v2"),
		"static_token": "pk_1_SECRET",
		"wire_format": "xml"
	})))
	.expect("Connection should build from options.");

	assert_eq!(*connection.codec(), WireFormat::Xml);

	let task: Task = connection
		.send(&get_task("abc"), &CancellationToken::new())
		.await
		.expect("XML task read should succeed.");

	assert_eq!(task.name, "Ship it");

	mock.assert_async().await;
}

#[tokio::test]
async fn oauth_connections_refresh_through_the_token_endpoint() {
	let server = MockServer::start_async().await;
	let stale = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/task/abc").header("authorization", "Bearer stale");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"err":"Token invalid","ECODE":"OAUTH_025"}"#);
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"fresh","token_type":"bearer","expires_in":3600,"refresh_token":"r2"}"#,
			);
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/task/abc").header("authorization", "Bearer fresh");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"id":"abc","name":"Ship it"}"#);
		})
		.await;
	let connection = Connection::from_options(&options(serde_json::json!({
		"base_url": server.url("/api/v2"),
		"static_token": "ignored",
		"oauth": {
			"client_id": "client",
			"client_secret": "secret",
			"token_url": server.url("/oauth/token"),
			"access_token": "stale",
			"refresh_token": "r1"
		}
	})))
	.expect("Connection should build from options.");
	let task: Task = connection
		.send(&get_task("abc"), &CancellationToken::new())
		.await
		.expect("Call should succeed after the refresh.");

	assert_eq!(task.id, "abc");

	stale.assert_calls_async(1).await;
	token.assert_calls_async(1).await;
	fresh.assert_calls_async(1).await;
}
