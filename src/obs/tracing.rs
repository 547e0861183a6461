// self
use crate::_prelude::*;

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type Instrumented<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type Instrumented<F> = F;

/// Span wrapper used by the connection and the OAuth strategy.
#[derive(Clone, Debug)]
pub struct PipelineSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl PipelineSpan {
	/// Creates a `taskpipe.call` span for one logical call.
	pub fn call(method: &str, path: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self { span: tracing::info_span!("taskpipe.call", method, path) }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (method, path);

			Self {}
		}
	}

	/// Creates a `taskpipe.refresh` span for one token exchange.
	pub fn refresh() -> Self {
		#[cfg(feature = "tracing")]
		{
			Self { span: tracing::info_span!("taskpipe.refresh") }
		}
		#[cfg(not(feature = "tracing"))]
		{
			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
