//! Resilient request pipeline for typed task-management REST clients: pluggable authentication,
//! bounded retries, optional caching, and interchangeable wire formats that resolve every failure
//! into a precise, matchable error taxonomy.
//!
//! The entry point is [`connection::Connection`]: callers describe one logical API call with a
//! [`request::RequestDescriptor`], hand it to [`Connection::send`](connection::Connection::send),
//! and receive either the decoded payload or an [`error::Error`] they can branch on.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

// Emits a `tracing` event when the feature is enabled; expands to nothing otherwise.
macro_rules! trace_event {
	($level:ident, $($arg:tt)+) => {
		#[cfg(feature = "tracing")]
		{
			tracing::$level!($($arg)+);
		}
	};
}

pub mod auth;
pub mod cache;
pub mod classify;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod obs;
pub mod plugin;
pub mod request;
pub mod retry;

#[cfg(any(test, feature = "test"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test`
	//! feature.

	pub use crate::_prelude::*;

	// self
	use crate::http::{HttpResponse, HttpTransport, TransportFuture};

	/// Transport double that replays a scripted list of outcomes and records every request.
	#[derive(Clone, Default)]
	pub struct ScriptedTransport {
		script: Arc<Mutex<VecDeque<ScriptedOutcome>>>,
		requests: Arc<Mutex<Vec<crate::http::HttpRequest>>>,
	}
	impl ScriptedTransport {
		/// Creates a transport that replays `outcomes` in order.
		pub fn new(outcomes: impl IntoIterator<Item = ScriptedOutcome>) -> Self {
			Self {
				script: Arc::new(Mutex::new(outcomes.into_iter().collect())),
				requests: Default::default(),
			}
		}

		/// Returns the number of requests dispatched so far.
		pub fn calls(&self) -> usize {
			self.requests.lock().len()
		}

		/// Returns clones of every dispatched request.
		pub fn requests(&self) -> Vec<crate::http::HttpRequest> {
			self.requests.lock().clone()
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn execute(&self, request: crate::http::HttpRequest) -> TransportFuture<'_> {
			self.requests.lock().push(request);

			let mut next = self.script.lock().pop_front();

			Box::pin(async move {
				loop {
					match next {
						Some(ScriptedOutcome::Respond { status, headers, body }) => {
							let mut builder = crate::http::response_builder().status(status);

							for (name, value) in headers {
								builder = builder.header(name, value);
							}

							return Ok(builder.body(body.into_bytes()).map_err(TransportError::network)?);
						},
						Some(ScriptedOutcome::Delayed { delay, outcome }) => {
							tokio::time::sleep(delay.unsigned_abs()).await;

							next = Some(*outcome);
						},
						Some(ScriptedOutcome::Fail(error)) => return Err(error),
						Some(ScriptedOutcome::Hang) => std::future::pending().await,
						None =>
							return Err(TransportError::network(std::io::Error::other(
								"Scripted transport ran out of responses.",
							))),
					}
				}
			})
		}
	}

	/// One scripted transport outcome.
	#[derive(Debug)]
	pub enum ScriptedOutcome {
		/// Respond with a status, headers, and body text.
		Respond {
			/// HTTP status code.
			status: u16,
			/// Response headers.
			headers: Vec<(&'static str, String)>,
			/// Response body.
			body: String,
		},
		/// Resolve `outcome` only after `delay`.
		Delayed {
			/// Wait before resolving.
			delay: Duration,
			/// Outcome produced after the wait.
			outcome: Box<ScriptedOutcome>,
		},
		/// Fail at the transport layer.
		Fail(TransportError),
		/// Never complete.
		Hang,
	}
	impl ScriptedOutcome {
		/// Shorthand for a header-less response.
		pub fn status(status: u16, body: impl Into<String>) -> Self {
			Self::Respond { status, headers: Vec::new(), body: body.into() }
		}

		/// Shorthand for a JSON response.
		pub fn json(status: u16, body: impl Into<String>) -> Self {
			Self::Respond {
				status,
				headers: vec![("content-type", "application/json".into())],
				body: body.into(),
			}
		}

		/// Delays this outcome by `delay`.
		pub fn after(self, delay: Duration) -> Self {
			Self::Delayed { delay, outcome: Box::new(self) }
		}

		/// Adds a header to a scripted response.
		pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
			if let Self::Respond { headers, .. } = &mut self {
				headers.push((name, value.into()));
			}

			self
		}
	}

	/// Reads the `Authorization` header of a recorded request.
	pub fn authorization_of(request: &crate::http::HttpRequest) -> Option<String> {
		request
			.headers()
			.get(crate::http::header::AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.map(str::to_owned)
	}

	/// Builds a response value without going through a transport.
	pub fn response(status: u16, body: &str) -> HttpResponse {
		crate::http::response_builder()
			.status(status)
			.body(body.as_bytes().to_vec())
			.expect("Test response should build.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use bytes::Bytes;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tokio_util::sync::CancellationToken;
	pub use url::Url;

	pub use crate::error::{Error, Result, TransportError};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(test)] use httpmock as _;
