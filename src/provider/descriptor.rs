//! Provider descriptor data structures shared by all flows.
//!
//! A descriptor is the whole of a provider's static configuration: endpoints, enabled grants,
//! client authentication mode, the default scope, and the API call that yields the current
//! user's profile. Providers are values, not subclasses.

/// HTTP verbs and relative API endpoints.
pub mod api;
/// Builder API for assembling provider descriptors.
pub mod builder;
/// Grant helpers wired into provider descriptors.
pub mod grant;
/// Provider-specific quirk toggles.
pub mod quirks;

pub use api::*;
pub use builder::*;
pub use grant::*;
pub use quirks::*;

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, ScopeSet},
	error::ConfigError,
};

/// Client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// `Authorization: Basic base64(client_id:client_secret)` on exchange and refresh calls.
	#[default]
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
	/// Public clients that prove possession via PKCE.
	NoneWithPkce,
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint used by the Authorization Code flow.
	pub authorization: Url,
	/// Token endpoint used for exchanges and refreshes.
	pub token: Url,
	/// Base URL that relative API paths are resolved against; always ends with `/`.
	pub api_base: Option<Url>,
}

/// Immutable provider descriptor consumed by flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Descriptor identifier.
	pub id: ProviderId,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Supported grant flags.
	pub supported_grants: SupportedGrants,
	/// Client authentication mechanism for the token endpoint.
	pub preferred_client_auth_method: ClientAuthMethod,
	/// Scope requested when the caller does not configure one.
	pub default_scope: ScopeSet,
	/// API call returning the authenticated user's profile.
	pub profile_endpoint: Option<ApiEndpoint>,
	/// Provider-specific quirks.
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}

	/// Checks whether the descriptor supports a given grant.
	pub fn supports(&self, grant: GrantType) -> bool {
		self.supported_grants.supports(grant)
	}

	/// Resolves an API path against the API base.
	///
	/// Absolute `https` URLs are returned untouched so callers can reach endpoints outside the
	/// base.
	pub fn api_url(&self, path: &str) -> Result<Url> {
		if let Ok(absolute) = Url::parse(path) {
			return if absolute.scheme() == "https" {
				Ok(absolute)
			} else {
				Err(ConfigError::InvalidApiPath { path: path.to_owned() }.into())
			};
		}

		let base = self.endpoints.api_base.as_ref().ok_or_else(|| {
			ConfigError::ProfileUnsupported {
				descriptor: self.id.to_string(),
				missing: "api base URL",
			}
		})?;

		base.join(path.trim_start_matches('/'))
			.map_err(|_| ConfigError::InvalidApiPath { path: path.to_owned() }.into())
	}
}
