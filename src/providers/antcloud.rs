//! ANTCloud (antinodehq) staging provider.
//!
//! The token endpoint expects `client_secret_basic` credentials on both the code exchange and
//! the refresh grant. The current user is read with `POST user-service/currentUser`.
//!
//! ```no_run
//! # async fn demo() -> oauth2_adapter::error::Result<()> {
//! use std::sync::Arc;
//!
//! use oauth2_adapter::{
//! 	auth::SessionId,
//! 	config::{AdapterConfig, ClientKeys},
//! 	providers::antcloud,
//! 	store::MemoryStore,
//! 	url::Url,
//! };
//!
//! let config = AdapterConfig::new(
//! 	Url::parse("https://app.example.com/callback").expect("Callback should parse."),
//! 	ClientKeys::new("client-id", "client-secret"),
//! );
//! let broker = antcloud::broker(&config, Arc::new(MemoryStore::default()))?;
//! let session = SessionId::new("visitor-1").expect("Session id should be valid.");
//! let authorization = broker.start_authorization(session.clone())?;
//!
//! println!("Visit {}", authorization.authorize_url);
//! // ... after the redirect:
//! // broker.complete_authorization(authorization, &state, &code).await?;
//! let profile = broker.fetch_user_profile(&session).await?;
//!
//! println!("Signed in as {}", profile.identifier);
//! # Ok(())
//! # }
//! ```

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, ScopeSet},
	config::AdapterConfig,
	error::ConfigError,
	flows::Broker,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	profile::{self, UserProfile},
	provider::{
		ApiEndpoint, ApiMethod, ClientAuthMethod, DefaultProviderStrategy, GrantType,
		ProviderDescriptor,
	},
	store::TokenStore,
};
#[cfg(feature = "reqwest")]
use crate::{flows::ReqwestBroker, http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Provider identifier.
pub const PROVIDER_ID: &str = "antcloud";
/// Scope requested when the configuration does not set one.
pub const DEFAULT_SCOPE: &str = "user";
/// Base URL for API paths.
pub const API_BASE_URL: &str = "https://api.staging.antinodehq.com/";
/// Authorization endpoint.
pub const AUTHORIZE_URL: &str = "https://auth.staging.antinodehq.com/oauth/authorize";
/// Token endpoint.
pub const TOKEN_URL: &str = "https://auth.staging.antinodehq.com/oauth/token";
/// Current-user endpoint, relative to [`API_BASE_URL`].
pub const CURRENT_USER_PATH: &str = "user-service/currentUser";

/// Shape of the `currentUser` payload. Every field is optional so presence can be checked.
#[derive(Debug, Deserialize)]
struct CurrentUser {
	#[serde(default)]
	id: Option<JsonValue>,
	#[serde(default)]
	name: Option<JsonValue>,
	#[serde(default)]
	email: Option<JsonValue>,
}

/// Descriptor for the ANTCloud staging environment.
pub fn descriptor() -> Result<ProviderDescriptor> {
	let parse = |raw: &str| {
		Url::parse(raw).map_err(|_| ConfigError::InvalidConfig {
			reason: format!("built-in URL `{raw}` does not parse"),
		})
	};

	Ok(ProviderDescriptor::builder(ProviderId::new(PROVIDER_ID).map_err(ConfigError::from)?)
		.authorization_endpoint(parse(AUTHORIZE_URL)?)
		.token_endpoint(parse(TOKEN_URL)?)
		.api_base(parse(API_BASE_URL)?)
		.support_grants([GrantType::AuthorizationCode, GrantType::RefreshToken])
		.preferred_client_auth_method(ClientAuthMethod::ClientSecretBasic)
		.default_scope(ScopeSet::new([DEFAULT_SCOPE]).map_err(ConfigError::from)?)
		.profile_endpoint(ApiEndpoint::new(ApiMethod::Post, CURRENT_USER_PATH))
		.build()
		.map_err(ConfigError::from)?)
}

/// Maps a `currentUser` payload into a [`UserProfile`].
///
/// `id` must be present and scalar; a missing, `null`, array or object id fails with
/// [`Error::UnexpectedApiResponse`]. `name` and `email` are copied as given and become `None`
/// when absent. Numeric ids are rendered as text.
pub fn map_current_user(payload: &JsonValue) -> Result<UserProfile> {
	if !payload.is_object() {
		return Err(Error::UnexpectedApiResponse {
			reason: "current user payload is not a JSON object".into(),
		});
	}

	let user = CurrentUser::deserialize(payload).map_err(|err| Error::UnexpectedApiResponse {
		reason: format!("current user payload cannot be read ({err})"),
	})?;
	let identifier =
		user.id.as_ref().and_then(profile::scalar_text).ok_or_else(|| {
			Error::UnexpectedApiResponse {
				reason: "current user `id` is missing or not a scalar".into(),
			}
		})?;

	Ok(UserProfile {
		identifier,
		display_name: user.name.as_ref().and_then(profile::scalar_text),
		email: user.email.as_ref().and_then(profile::scalar_text),
	})
}

/// Builds an ANTCloud broker on a caller-supplied transport.
pub fn broker_with_http_client<C, M>(
	config: &AdapterConfig,
	store: Arc<dyn TokenStore>,
	http_client: impl Into<Arc<C>>,
	mapper: impl Into<Arc<M>>,
) -> Result<Broker<C, M>>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	config.validate()?;

	let mut broker = Broker::with_http_client(
		store,
		descriptor()?,
		Arc::new(DefaultProviderStrategy),
		config.keys.id.clone(),
		http_client,
		mapper,
	)
	.with_callback(config.callback.clone())
	.with_profile_mapper(map_current_user);

	if let Some(secret) = config.keys.secret.as_deref() {
		broker = broker.with_client_secret(secret);
	}
	if let Some(scope) = config.scope()? {
		broker = broker.with_scope(scope);
	}

	Ok(broker)
}

/// Builds an ANTCloud broker on the reqwest transport.
#[cfg(feature = "reqwest")]
pub fn broker(config: &AdapterConfig, store: Arc<dyn TokenStore>) -> Result<ReqwestBroker> {
	broker_with_http_client(config, store, ReqwestHttpClient::new()?, ReqwestTransportErrorMapper)
}
