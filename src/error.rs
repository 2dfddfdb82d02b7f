//! Adapter-level error types shared across flows, providers, and stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical adapter error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Requested scopes exceed what was granted.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Provider- or adapter-supplied reason string.
		reason: String,
	},
	/// Provider rejected the grant (e.g., bad code or refresh token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or adapter-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or adapter-supplied reason string.
		reason: String,
	},
	/// Token has been revoked and must not be reused.
	#[error("Token has been revoked.")]
	Revoked,
	/// No access token is stored for the session.
	#[error("Session `{session}` is not connected to the provider.")]
	NotConnected {
		/// Session identifier that was looked up.
		session: String,
	},
	/// Provider API answered with a non-success HTTP status.
	#[error("Provider API request to {url} failed with HTTP {status}.")]
	ApiStatus {
		/// Fully-resolved request URL.
		url: String,
		/// HTTP status code returned by the provider.
		status: u16,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Truncated response body for diagnostics.
		body_preview: String,
	},
	/// Provider API returned a payload the adapter cannot interpret.
	#[error("Unexpected API response: {reason}.")]
	UnexpectedApiResponse {
		/// What was wrong with the payload.
		reason: String,
	},
}

/// Configuration and validation failures raised by the adapter.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// API path cannot be resolved against the descriptor's API base.
	#[error("API path `{path}` cannot be resolved.")]
	InvalidApiPath {
		/// Path supplied by the caller.
		path: String,
	},
	/// A configured header name or value is not valid HTTP.
	#[error("Header `{name}` is not a valid HTTP header.")]
	InvalidHeader {
		/// Offending header name.
		name: String,
	},
	/// Adapter configuration is incomplete or malformed.
	#[error("Adapter configuration is invalid: {reason}.")]
	InvalidConfig {
		/// What was wrong with the configuration.
		reason: String,
	},
	/// Authorization was started without a callback URL.
	#[error("No callback URL is configured for the authorization flow.")]
	MissingCallback,

	/// Descriptor does not enable the requested grant.
	#[error("Descriptor `{descriptor}` does not enable the {grant} grant.")]
	UnsupportedGrant {
		/// Provider identifier string.
		descriptor: String,
		/// Disabled grant label.
		grant: &'static str,
	},
	/// Descriptor has no API base or profile endpoint, or no profile mapper is attached.
	#[error("Provider `{descriptor}` cannot fetch user profiles: {missing}.")]
	ProfileUnsupported {
		/// Provider identifier string.
		descriptor: String,
		/// Which piece of configuration is missing.
		missing: &'static str,
	},
	/// Cached record is missing a refresh secret.
	#[error("Cached token record is missing a refresh token.")]
	MissingRefreshToken,
	/// Request scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Identifier validation failed.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Token record builder validation failed.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] crate::auth::TokenRecordBuilderError),
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a zero duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or adapter-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
	/// HTTP client reported a failure it could not classify.
	#[error("HTTP client failed while calling the provider: {message}.")]
	Other {
		/// Client-supplied description.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn unexpected_api_response_mentions_reason() {
		let err = Error::UnexpectedApiResponse { reason: "missing `id` field".into() };

		assert_eq!(err.to_string(), "Unexpected API response: missing `id` field.");
	}

	#[test]
	fn config_errors_are_transparent() {
		let err: Error = ConfigError::MissingCallback.into();

		assert!(matches!(err, Error::Config(ConfigError::MissingCallback)));
		assert_eq!(err.to_string(), "No callback URL is configured for the authorization flow.");
	}
}
