//! Observer hooks invoked around pipeline execution.
//!
//! Plugins see immutable views only, so they can log, count, or trace calls but never alter a
//! request, a response, or the call's result. Hooks run in registration order.

// self
use crate::{
	_prelude::*,
	http::{HttpRequest, HttpResponse},
	request::RequestDescriptor,
	retry::RetryContext,
};

/// Call-level context shared by every hook.
#[derive(Clone, Copy, Debug)]
pub struct PluginContext<'a> {
	/// Descriptor of the logical call.
	pub descriptor: &'a RequestDescriptor,
}

/// Cross-cutting observer; every hook defaults to a no-op.
pub trait PipelinePlugin
where
	Self: Send + Sync,
{
	/// Called with each attempt's request before credentials are attached.
	fn on_request(&self, ctx: &PluginContext<'_>, attempt: u32, request: &HttpRequest) {
		let _ = (ctx, attempt, request);
	}

	/// Called with each response the transport returns, whatever its status.
	fn on_response(&self, ctx: &PluginContext<'_>, attempt: u32, response: &HttpResponse) {
		let _ = (ctx, attempt, response);
	}

	/// Called when a retry has been scheduled.
	fn on_retry(&self, ctx: &PluginContext<'_>, retry: &RetryContext<'_>) {
		let _ = (ctx, retry);
	}

	/// Called once with the error a call is about to return.
	fn on_error(&self, ctx: &PluginContext<'_>, error: &Error) {
		let _ = (ctx, error);
	}
}
