//! Spans and counters emitted around adapter flows.
//!
//! Both are opt-in:
//!
//! - `tracing` wraps each flow in an `oauth2_adapter.flow` span carrying `flow` and `stage`.
//! - `metrics` bumps `oauth2_adapter_flow_total`, labeled by `flow` and `outcome`.
//!
//! With neither feature enabled the helpers compile down to nothing.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

pub(crate) use self::tracing::{flow_debug, flow_warn};

// self
use crate::_prelude::*;

/// Flows the adapter reports on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorize URL construction and code exchange.
	AuthorizationCode,
	/// Refresh token grant.
	Refresh,
	/// Bearer-authenticated provider API call.
	ApiRequest,
	/// Current user profile lookup.
	UserProfile,
}
impl FlowKind {
	/// Label used in span fields and metric labels.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::Refresh => "refresh",
			FlowKind::ApiRequest => "api_request",
			FlowKind::UserProfile => "user_profile",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome label for a flow invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// The flow was entered.
	Attempt,
	/// The flow returned `Ok`.
	Success,
	/// The flow returned `Err`.
	Failure,
}
impl FlowOutcome {
	/// Label used in metric labels.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a flow span and records its attempt and outcome.
pub(crate) async fn observe<F, T>(kind: FlowKind, stage: &'static str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	record_flow_outcome(
		kind,
		if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
	);

	result
}
