//! The generic OAuth 2.0 client and the flows it runs.
//!
//! A [`Broker`] is configured entirely by value: a [`ProviderDescriptor`], a
//! [`ProviderStrategy`], client credentials, and optionally a [`ProfileMapper`]. Each flow lives
//! in its own module and adds methods to the broker.

pub mod api;
pub mod auth_code;
pub mod common;
pub mod connection;
pub mod profile;
pub mod refresh;

pub use auth_code::*;
pub use common::*;

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
// self
use crate::{
	_prelude::*,
	auth::ScopeSet,
	http::{TokenHeaders, TokenHttpClient},
	oauth::TransportErrorMapper,
	profile::ProfileMapper,
	provider::{ClientAuthMethod, GrantType, ProviderDescriptor, ProviderStrategy},
	store::TokenStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Broker wired to the default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// OAuth 2.0 client bound to one provider.
///
/// The broker owns the transport, the token store, and the provider configuration, so flows only
/// deal with grant logic. Token endpoint headers are derived from the credentials by
/// [`Broker::initialize`], which every credential-changing setter re-runs.
#[derive(Clone)]
pub struct Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Transport used for token and API requests.
	pub http_client: Arc<C>,
	/// Maps transport failures into adapter errors.
	pub transport_mapper: Arc<M>,
	/// Where issued tokens are kept.
	pub store: Arc<dyn TokenStore>,
	/// Provider endpoints, grants, and quirks.
	pub descriptor: ProviderDescriptor,
	/// Provider-specific hooks.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret for confidential clients.
	pub client_secret: Option<String>,
	/// Headers sent to the token endpoint, per grant.
	pub token_headers: TokenHeaders,
	/// Redirect URI used when none is passed explicitly.
	pub callback: Option<Url>,
	/// Scope override; falls back to the descriptor's default scope.
	pub scope: Option<ScopeSet>,
	/// Maps user-info payloads into profiles.
	pub profile_mapper: Option<Arc<dyn ProfileMapper>>,
	flow_guards: common::FlowGuards,
}
impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a broker on top of the given transport and error mapper.
	pub fn with_http_client(
		store: Arc<dyn TokenStore>,
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		client_id: impl Into<String>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		let mut broker = Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store,
			descriptor,
			strategy,
			client_id: client_id.into(),
			client_secret: None,
			token_headers: TokenHeaders::default(),
			callback: None,
			scope: None,
			profile_mapper: None,
			flow_guards: Default::default(),
		};

		broker.initialize();

		broker
	}

	/// Sets the client secret and recomputes the token headers.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());
		self.initialize();

		self
	}

	/// Sets the default redirect URI.
	pub fn with_callback(mut self, callback: Url) -> Self {
		self.callback = Some(callback);

		self
	}

	/// Overrides the scope requested during authorization.
	pub fn with_scope(mut self, scope: ScopeSet) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Attaches the mapper used by [`Broker::fetch_user_profile`].
	pub fn with_profile_mapper(mut self, mapper: impl ProfileMapper + 'static) -> Self {
		self.profile_mapper = Some(Arc::new(mapper));

		self
	}

	/// Derives the token endpoint headers from the credentials.
	///
	/// For `client_secret_basic` clients, both the exchange and the refresh maps receive
	/// `Authorization: Basic base64("<client_id>:<client_secret>")`, encoded with the standard
	/// alphabet and without URL-encoding either part. A missing secret encodes as empty. The
	/// strategy may then adjust each map. Running it again yields the same headers.
	pub fn initialize(&mut self) {
		let mut headers = TokenHeaders::default();

		if self.descriptor.preferred_client_auth_method == ClientAuthMethod::ClientSecretBasic {
			let secret = self.client_secret.as_deref().unwrap_or_default();
			let credentials = STANDARD.encode(format!("{}:{secret}", self.client_id));
			let authorization = BTreeMap::from([(
				"Authorization".to_owned(),
				format!("Basic {credentials}"),
			)]);

			headers.exchange = authorization.clone();
			headers.refresh = authorization;
		}

		for grant in [GrantType::AuthorizationCode, GrantType::RefreshToken] {
			self.strategy.augment_token_headers(grant, headers.for_grant_mut(grant));
		}

		self.token_headers = headers;
	}

	/// Scope requested when the caller does not pass one.
	pub fn effective_scope(&self) -> &ScopeSet {
		self.scope.as_ref().unwrap_or(&self.descriptor.default_scope)
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a broker with its own reqwest transport.
	pub fn new(
		store: Arc<dyn TokenStore>,
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		client_id: impl Into<String>,
	) -> Self {
		Self::with_http_client(
			store,
			descriptor,
			strategy,
			client_id,
			ReqwestHttpClient::default(),
			ReqwestTransportErrorMapper,
		)
	}
}
impl<C, M> Debug for Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("descriptor", &self.descriptor)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("token_headers", &self.token_headers)
			.field("callback", &self.callback)
			.field("scope", &self.scope)
			.field("profile_mapper_set", &self.profile_mapper.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::ScriptedHttpClient, auth::ProviderId, oauth::BasicTransportErrorMapper,
		provider::DefaultProviderStrategy, store::MemoryStore,
	};

	type TestBroker = Broker<ScriptedHttpClient, BasicTransportErrorMapper>;

	fn descriptor(method: ClientAuthMethod) -> ProviderDescriptor {
		ProviderDescriptor::builder(ProviderId::new("demo").expect("Id should be valid."))
			.authorization_endpoint(
				Url::parse("https://auth.example.com/authorize").expect("URL should parse."),
			)
			.token_endpoint(Url::parse("https://auth.example.com/token").expect("URL should parse."))
			.support_grants([GrantType::AuthorizationCode, GrantType::RefreshToken])
			.preferred_client_auth_method(method)
			.build()
			.expect("Descriptor should build.")
	}

	fn broker(method: ClientAuthMethod) -> TestBroker {
		Broker::with_http_client(
			Arc::new(MemoryStore::default()),
			descriptor(method),
			Arc::new(DefaultProviderStrategy),
			"abc",
			ScriptedHttpClient::default(),
			BasicTransportErrorMapper,
		)
	}

	#[test]
	fn initialize_sets_basic_credentials_for_both_grants() {
		let broker = broker(ClientAuthMethod::ClientSecretBasic).with_client_secret("xyz");

		assert_eq!(
			broker.token_headers.exchange.get("Authorization").map(String::as_str),
			Some("Basic YWJjOnh5eg==")
		);
		assert_eq!(broker.token_headers.exchange, broker.token_headers.refresh);
	}

	#[test]
	fn initialize_is_idempotent() {
		let mut broker = broker(ClientAuthMethod::ClientSecretBasic).with_client_secret("xyz");
		let before = broker.token_headers.clone();

		broker.initialize();

		assert_eq!(broker.token_headers, before);
	}

	#[test]
	fn credentials_are_not_url_encoded() {
		let broker = broker(ClientAuthMethod::ClientSecretBasic).with_client_secret("p@ss:w/rd");

		assert_eq!(
			broker.token_headers.refresh.get("Authorization").map(String::as_str),
			Some(format!("Basic {}", STANDARD.encode("abc:p@ss:w/rd")).as_str())
		);
	}

	#[test]
	fn missing_secret_still_yields_basic_credentials() {
		let broker = broker(ClientAuthMethod::ClientSecretBasic);

		assert_eq!(
			broker.token_headers.exchange.get("Authorization").map(String::as_str),
			Some("Basic YWJjOg==")
		);
		assert_eq!(broker.token_headers.exchange, broker.token_headers.refresh);
	}

	#[test]
	fn no_header_without_basic_auth() {
		assert!(broker(ClientAuthMethod::NoneWithPkce).token_headers.exchange.is_empty());
		assert!(
			broker(ClientAuthMethod::ClientSecretPost)
				.with_client_secret("xyz")
				.token_headers
				.refresh
				.is_empty()
		);
	}

	#[test]
	fn strategies_can_extend_token_headers() {
		struct Tagged;
		impl ProviderStrategy for Tagged {
			fn classify_token_error(
				&self,
				ctx: &crate::provider::ProviderErrorContext,
			) -> crate::provider::ProviderErrorKind {
				DefaultProviderStrategy.classify_token_error(ctx)
			}

			fn augment_token_headers(&self, grant: GrantType, headers: &mut BTreeMap<String, String>) {
				if grant == GrantType::RefreshToken {
					headers.insert("X-Refresh".into(), "1".into());
				}
			}
		}

		let mut broker = broker(ClientAuthMethod::ClientSecretBasic);

		broker.strategy = Arc::new(Tagged);

		let broker = broker.with_client_secret("xyz");

		assert!(broker.token_headers.refresh.contains_key("X-Refresh"));
		assert!(!broker.token_headers.exchange.contains_key("X-Refresh"));
		assert!(broker.token_headers.exchange.contains_key("Authorization"));
	}

	#[test]
	fn scope_override_wins_over_default() {
		let scope = ScopeSet::new(["user", "email"]).expect("Scope should be valid.");
		let broker = broker(ClientAuthMethod::ClientSecretBasic);

		assert!(broker.effective_scope().is_empty());
		assert_eq!(broker.with_scope(scope.clone()).effective_scope(), &scope);
	}
}
