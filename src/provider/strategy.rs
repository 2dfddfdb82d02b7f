//! Behavioral hooks a provider can override on top of its descriptor.

// self
use crate::{_prelude::*, provider::descriptor::GrantType};

/// Per-provider behavior that a descriptor alone cannot express.
///
/// Every hook works on crate-owned data so implementations never see the HTTP client.
pub trait ProviderStrategy: Send + Sync {
	/// Sorts a failed token request into one of the [`ProviderErrorKind`] buckets.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;

	/// Adds extra form fields to a token request before it is sent.
	fn augment_token_request(&self, _grant: GrantType, _form: &mut BTreeMap<String, String>) {}

	/// Adjusts the headers attached to a token request.
	///
	/// `headers` already holds the client authentication header computed from the configured
	/// credentials; implementations may add to it or replace it.
	fn augment_token_headers(&self, _grant: GrantType, _headers: &mut BTreeMap<String, String>) {}
}

/// Buckets a token endpoint failure can fall into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// The code or refresh token is no longer usable.
	InvalidGrant,
	/// The provider did not accept the client credentials.
	InvalidClient,
	/// The provider refused the requested scope.
	InsufficientScope,
	/// Worth retrying later.
	Transient,
}

/// Facts about a failed token request, handed to [`ProviderStrategy::classify_token_error`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant the request was made for.
	pub grant_type: GrantType,
	/// HTTP status, when a response arrived.
	pub http_status: Option<u16>,
	/// OAuth `error` code from the response body.
	pub oauth_error: Option<String>,
	/// OAuth `error_description` from the response body.
	pub error_description: Option<String>,
	/// Leading part of a body that was not an OAuth error document.
	pub body_preview: Option<String>,
	/// Set when no response arrived at all.
	pub network_error: bool,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Empty context for `grant_type`.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
			network_error: false,
		}
	}

	/// Context for a request that never got a response.
	pub fn network_failure(grant_type: GrantType) -> Self {
		Self::new(grant_type).with_network_error(true)
	}

	/// Sets the network error flag.
	pub fn with_network_error(mut self, network_error: bool) -> Self {
		self.network_error = network_error;

		self
	}

	/// Sets the HTTP status.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Sets the OAuth `error` code.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Sets the OAuth `error_description`.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Sets the body preview, cut down to a bounded length.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(preview(&body.into(), Self::BODY_PREVIEW_LIMIT));

		self
	}
}

/// Strategy used when a provider needs no special handling.
///
/// Looks at the OAuth error fields first, then at the body text, then at the status code.
/// Network failures are always transient.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error {
			return ProviderErrorKind::Transient;
		}

		[ctx.oauth_error.as_deref(), ctx.error_description.as_deref()]
			.into_iter()
			.flatten()
			.find_map(kind_from_code)
			.or_else(|| ctx.error_description.as_deref().and_then(kind_from_text))
			.or_else(|| ctx.body_preview.as_deref().and_then(kind_from_text))
			.unwrap_or_else(|| kind_from_status(ctx.http_status))
	}
}

pub(crate) fn preview(body: &str, limit: usize) -> String {
	match body.char_indices().nth(limit) {
		Some((cut, _)) => format!("{}…", &body[..cut]),
		None => body.to_owned(),
	}
}

fn kind_from_code(code: &str) -> Option<ProviderErrorKind> {
	const TABLE: [(&str, ProviderErrorKind); 8] = [
		("invalid_grant", ProviderErrorKind::InvalidGrant),
		("access_denied", ProviderErrorKind::InvalidGrant),
		("invalid_client", ProviderErrorKind::InvalidClient),
		("unauthorized_client", ProviderErrorKind::InvalidClient),
		("invalid_scope", ProviderErrorKind::InsufficientScope),
		("insufficient_scope", ProviderErrorKind::InsufficientScope),
		("temporarily_unavailable", ProviderErrorKind::Transient),
		("server_error", ProviderErrorKind::Transient),
	];

	TABLE.iter().find(|(name, _)| code.trim().eq_ignore_ascii_case(name)).map(|(_, kind)| *kind)
}

fn kind_from_text(text: &str) -> Option<ProviderErrorKind> {
	let text = text.to_ascii_lowercase();

	if text.contains("invalid_grant") {
		Some(ProviderErrorKind::InvalidGrant)
	} else if text.contains("invalid_client") {
		Some(ProviderErrorKind::InvalidClient)
	} else if text.contains("insufficient_scope") || text.contains("invalid_scope") {
		Some(ProviderErrorKind::InsufficientScope)
	} else if text.contains("temporarily_unavailable") || text.contains("retry") {
		Some(ProviderErrorKind::Transient)
	} else {
		None
	}
}

fn kind_from_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401) => ProviderErrorKind::InvalidClient,
		Some(403) => ProviderErrorKind::InsufficientScope,
		_ => ProviderErrorKind::Transient,
	}
}
