// self
use crate::{_prelude::*, obs::FlowKind};

/// Future returned by [`FlowSpan::instrument`].
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`].
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span attached to a single flow invocation.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens an `oauth2_adapter.flow` span for `kind` at `stage`.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self { span: tracing::info_span!("oauth2_adapter.flow", flow = kind.as_str(), stage) }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Attaches the span to `fut`; the span is entered on every poll.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
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

/// Emits a warning event inside the current span.
macro_rules! flow_warn {
	($($arg:tt)*) => {
		#[cfg(feature = "tracing")]
		tracing::warn!($($arg)*);
	};
}
pub(crate) use flow_warn;

/// Emits a debug event inside the current span.
macro_rules! flow_debug {
	($($arg:tt)*) => {
		#[cfg(feature = "tracing")]
		tracing::debug!($($arg)*);
	};
}
pub(crate) use flow_debug;

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrumented_futures_keep_their_output() {
		let span = FlowSpan::new(FlowKind::ApiRequest, "instrumented_futures_keep_their_output");

		assert_eq!(span.instrument(async { 42 }).await, 42);
	}
}
