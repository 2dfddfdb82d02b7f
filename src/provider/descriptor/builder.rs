// self
use crate::{
	_prelude::*,
	auth::{ProviderId, ScopeSet},
	provider::{
		ApiEndpoint, ClientAuthMethod, GrantType, ProviderDescriptor, ProviderEndpoints,
		ProviderQuirks, SupportedGrants,
	},
};

/// Reasons a descriptor is refused by [`ProviderDescriptorBuilder::build`].
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderDescriptorError {
	/// No authorization endpoint was set.
	#[error("Descriptor has no authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// No token endpoint was set.
	#[error("Descriptor has no token endpoint.")]
	MissingTokenEndpoint,
	/// Every grant is disabled.
	#[error("Descriptor enables no grant.")]
	NoSupportedGrants,
	/// An endpoint is not `https`.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// `authorization`, `token`, or `api`.
		endpoint: &'static str,
		/// Offending URL.
		url: String,
	},
	/// Relative paths only resolve below the API base when it ends with a slash.
	#[error("The API base URL must end with `/`: {url}.")]
	ApiBaseWithoutTrailingSlash {
		/// API base URL that failed validation.
		url: String,
	},
	/// A profile endpoint was declared without an API base to resolve it against.
	#[error("A profile endpoint requires an API base URL.")]
	ProfileEndpointWithoutApiBase,
	/// The scope delimiter is a control character.
	#[error("Scope delimiter must be a printable character.")]
	InvalidScopeDelimiter {
		/// Offending delimiter.
		delimiter: char,
	},
}

/// Step-by-step construction of a [`ProviderDescriptor`]; nothing is checked until `build`.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	id: ProviderId,
	authorization_endpoint: Option<Url>,
	token_endpoint: Option<Url>,
	api_base: Option<Url>,
	supported_grants: SupportedGrants,
	preferred_client_auth_method: ClientAuthMethod,
	default_scope: ScopeSet,
	profile_endpoint: Option<ApiEndpoint>,
	quirks: ProviderQuirks,
}
impl ProviderDescriptorBuilder {
	/// Empty builder for provider `id`.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			authorization_endpoint: None,
			token_endpoint: None,
			api_base: None,
			supported_grants: SupportedGrants::default(),
			preferred_client_auth_method: ClientAuthMethod::default(),
			default_scope: ScopeSet::default(),
			profile_endpoint: None,
			quirks: ProviderQuirks::default(),
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the base URL for API requests.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Enables `grant`.
	pub fn support_grant(mut self, grant: GrantType) -> Self {
		self.supported_grants = self.supported_grants.enable(grant);

		self
	}

	/// Enables every grant in `grants`.
	pub fn support_grants<I>(mut self, grants: I) -> Self
	where
		I: IntoIterator<Item = GrantType>,
	{
		self.supported_grants =
			grants.into_iter().fold(self.supported_grants, SupportedGrants::enable);

		self
	}

	/// How the client authenticates at the token endpoint.
	pub fn preferred_client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.preferred_client_auth_method = method;

		self
	}

	/// Sets the scope requested when callers do not configure one.
	pub fn default_scope(mut self, scope: ScopeSet) -> Self {
		self.default_scope = scope;

		self
	}

	/// Declares the API call that returns the current user's profile.
	pub fn profile_endpoint(mut self, endpoint: ApiEndpoint) -> Self {
		self.profile_endpoint = Some(endpoint);

		self
	}

	/// Replaces the quirks.
	pub fn quirks(mut self, quirks: ProviderQuirks) -> Self {
		self.quirks = quirks;

		self
	}

	/// Validates and returns the descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let descriptor = ProviderDescriptor {
			id: self.id,
			endpoints: ProviderEndpoints { authorization, token, api_base: self.api_base },
			supported_grants: self.supported_grants,
			preferred_client_auth_method: self.preferred_client_auth_method,
			default_scope: self.default_scope,
			profile_endpoint: self.profile_endpoint,
			quirks: self.quirks,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		if self.supported_grants.is_empty() {
			return Err(ProviderDescriptorError::NoSupportedGrants);
		}

		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;

		match self.endpoints.api_base.as_ref() {
			Some(base) => {
				validate_endpoint("api", base)?;

				if !base.path().ends_with('/') {
					return Err(ProviderDescriptorError::ApiBaseWithoutTrailingSlash {
						url: base.to_string(),
					});
				}
			},
			None if self.profile_endpoint.as_ref().is_some_and(|e| Url::parse(&e.path).is_err()) =>
				return Err(ProviderDescriptorError::ProfileEndpointWithoutApiBase),
			None => {},
		}

		if self.quirks.scope_delimiter.is_control() {
			return Err(ProviderDescriptorError::InvalidScopeDelimiter {
				delimiter: self.quirks.scope_delimiter,
			});
		}

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	if url.scheme() != "https" {
		Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}
