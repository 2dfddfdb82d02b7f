//! Token endpoint calls built on the `oauth2` crate.
//!
//! [`BasicFacade`] turns a [`ProviderDescriptor`] into a configured `oauth2` client and runs the
//! authorization code and refresh grants through a [`TokenHttpClient`]. Responses become
//! [`TokenRecord`]s; failures are sorted into the adapter's error taxonomy.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
	http::HeaderMap,
};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenRecord},
	error::{ConfigError, TransientError, TransportError},
	http::{HeaderInjector, ResponseMetadata, ResponseMetadataSlot, TokenHeaders, TokenHttpClient},
	provider::{
		ClientAuthMethod, GrantType, ProviderDescriptor, ProviderErrorContext, ProviderErrorKind,
		ProviderStrategy,
	},
	store::StoreKey,
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Turns transport failures into adapter [`Error`] values.
///
/// Used for token requests and provider API calls alike.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Maps `error`, using whatever the transport recorded in `metadata`.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Mapper that works with any transport error type.
#[derive(Clone, Debug, Default)]
pub struct BasicTransportErrorMapper;
impl<E> TransportErrorMapper<E> for BasicTransportErrorMapper
where
	E: 'static + Send + Sync + StdError,
{
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error {
		map_common_client_error(metadata, error)
	}
}

/// Mapper for [`crate::http::ReqwestHttpClient`]; separates timeouts and builder failures.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<ReqwestError>,
	) -> Error {
		let HttpClientError::Reqwest(inner) = error else {
			return map_common_client_error(metadata, error);
		};

		if inner.is_builder() {
			return ConfigError::from(*inner).into();
		}
		if inner.is_timeout() {
			return TransientError::TokenEndpoint {
				message: "Request to the provider timed out".into(),
				status: meta_status(metadata).or_else(|| inner.status().map(|s| s.as_u16())),
				retry_after: meta_retry_after(metadata),
			}
			.into();
		}

		TransportError::from(*inner).into()
	}
}

fn map_common_client_error<E>(
	metadata: Option<&ResponseMetadata>,
	error: HttpClientError<E>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match error {
		HttpClientError::Reqwest(inner) => TransportError::Network { source: inner }.into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransportError::Other { message }.into(),
		_ => TransientError::TokenEndpoint {
			message: "HTTP client failed while calling the provider".into(),
			status: meta_status(metadata),
			retry_after: meta_retry_after(metadata),
		}
		.into(),
	}
}

pub(crate) trait OAuth2Facade {
	fn exchange_authorization_code<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		key: &'a StoreKey,
		code: &'a str,
		pkce_verifier: &'a str,
		requested_scope: &'a ScopeSet,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, TokenRecord>;

	fn refresh_token<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		key: &'a StoreKey,
		refresh_token: &'a str,
		current_scope: &'a ScopeSet,
	) -> FacadeFuture<'a, TokenRecord>;
}

/// `oauth2`-backed facade configured from a descriptor.
pub(crate) struct BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	exchange_headers: HeaderMap,
	refresh_headers: HeaderMap,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the facade.
	///
	/// With `client_secret_basic` the secret is never handed to `oauth2`: the `Authorization`
	/// header comes from `headers` instead, so it is sent exactly as configured.
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		client_id: &str,
		client_secret: Option<&str>,
		redirect_uri: Option<&Url>,
		headers: &TokenHeaders,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let auth_url = AuthUrl::from_url(descriptor.endpoints.authorization.clone());
		let token_url = TokenUrl::from_url(descriptor.endpoints.token.clone());
		let mut oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);

		if let (ClientAuthMethod::ClientSecretPost, Some(secret)) =
			(descriptor.preferred_client_auth_method, client_secret)
		{
			oauth_client = oauth_client
				.set_client_secret(ClientSecret::new(secret.to_owned()))
				.set_auth_type(AuthType::RequestBody);
		}
		if let Some(redirect) = redirect_uri {
			oauth_client = oauth_client.set_redirect_uri(RedirectUrl::from_url(redirect.clone()));
		}

		Ok(Self {
			oauth_client,
			http_client,
			error_mapper,
			exchange_headers: crate::http::header_map(&headers.exchange)?,
			refresh_headers: crate::http::header_map(&headers.refresh)?,
		})
	}

	fn extra_params(
		strategy: &dyn ProviderStrategy,
		grant: GrantType,
	) -> BTreeMap<String, String> {
		let mut form = BTreeMap::new();

		strategy.augment_token_request(grant, &mut form);

		form
	}
}
impl<C, M> OAuth2Facade for BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_authorization_code<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		key: &'a StoreKey,
		code: &'a str,
		pkce_verifier: &'a str,
		requested_scope: &'a ScopeSet,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, TokenRecord> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = HeaderInjector::new(
				self.http_client.with_metadata(meta.clone()),
				self.exchange_headers.clone(),
			);
			let mut request = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_redirect_uri(Cow::Owned(RedirectUrl::from_url(redirect_uri.clone())))
				.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()));

			for (name, value) in Self::extra_params(strategy, GrantType::AuthorizationCode) {
				request = request.add_extra_param(name, value);
			}

			let response = request.request_async(&handle).await.map_err(|err| {
				map_request_error(
					strategy,
					GrantType::AuthorizationCode,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			map_token_response(key, requested_scope, None, &response)
		})
	}

	fn refresh_token<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		key: &'a StoreKey,
		refresh_token: &'a str,
		current_scope: &'a ScopeSet,
	) -> FacadeFuture<'a, TokenRecord> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = HeaderInjector::new(
				self.http_client.with_metadata(meta.clone()),
				self.refresh_headers.clone(),
			);
			let secret = RefreshToken::new(refresh_token.to_owned());
			let mut request = self.oauth_client.exchange_refresh_token(&secret);

			for (name, value) in Self::extra_params(strategy, GrantType::RefreshToken) {
				request = request.add_extra_param(name, value);
			}

			let response = request.request_async(&handle).await.map_err(|err| {
				map_request_error(
					strategy,
					GrantType::RefreshToken,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			map_token_response(key, current_scope, Some(refresh_token), &response)
		})
	}
}

/// Builds a record from a token response.
///
/// Scopes fall back to `requested_scope` when the provider omits them; the refresh token falls
/// back to `previous_refresh` when the provider does not rotate it.
pub(crate) fn map_token_response(
	key: &StoreKey,
	requested_scope: &ScopeSet,
	previous_refresh: Option<&str>,
	response: &BasicTokenResponse,
) -> Result<TokenRecord> {
	let scope = match response.scopes() {
		Some(scopes) =>
			ScopeSet::new(scopes.iter().map(|scope| scope.as_str())).map_err(ConfigError::from)?,
		None => requested_scope.clone(),
	};
	let mut builder = TokenRecord::builder(key.provider.clone(), key.session.clone())
		.scope(scope)
		.access_token(response.access_token().secret().to_owned())
		.issued_at(OffsetDateTime::now_utc());

	if let Some(lifetime) = response.expires_in() {
		let secs = i64::try_from(lifetime.as_secs()).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

		if secs <= 0 {
			return Err(ConfigError::NonPositiveExpiresIn.into());
		}

		builder = builder.expires_in(Duration::seconds(secs));
	}

	if let Some(refresh) =
		response.refresh_token().map(|token| token.secret().as_str()).or(previous_refresh)
	{
		builder = builder.refresh_token(refresh);
	}

	builder.build().map_err(|err| ConfigError::from(err).into())
}

fn map_request_error<E, M>(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response(strategy, grant, &response, meta),
		RequestTokenError::Request(error) => mapper.map_transport_error(meta, error),
		RequestTokenError::Parse(source, body) => {
			let status = meta_status(meta);

			if status.is_some_and(|code| code >= 400) {
				let text = String::from_utf8_lossy(&body).into_owned();
				let mut ctx = ProviderErrorContext::new(grant).with_body_preview(text);

				if let Some(code) = status {
					ctx = ctx.with_http_status(code);
				}

				return classify(strategy, &ctx, ctx.body_preview.clone().unwrap_or_default(), meta);
			}

			TransientError::TokenResponseParse { source, status }.into()
		},
		RequestTokenError::Other(message) => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_server_response(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	response: &BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let code = response.error().as_ref().to_string();
	let mut ctx = ProviderErrorContext::new(grant).with_oauth_error(code.clone());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	let reason = match response.error_description() {
		Some(description) => format!("{code}: {description}"),
		None => code,
	};

	classify(strategy, &ctx, reason, meta)
}

fn classify(
	strategy: &dyn ProviderStrategy,
	ctx: &ProviderErrorContext,
	reason: String,
	meta: Option<&ResponseMetadata>,
) -> Error {
	match strategy.classify_token_error(ctx) {
		ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason },
		ProviderErrorKind::InvalidClient => Error::InvalidClient { reason },
		ProviderErrorKind::InsufficientScope => Error::InsufficientScope { reason },
		ProviderErrorKind::Transient => TransientError::TokenEndpoint {
			message: reason,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::{ProviderId, SessionId};

	fn key() -> StoreKey {
		StoreKey::new(
			&ProviderId::new("antcloud").expect("Provider fixture should be valid."),
			&SessionId::new("session-1").expect("Session fixture should be valid."),
		)
	}

	fn response(json: &str) -> BasicTokenResponse {
		serde_json::from_str(json).expect("Token response fixture should parse.")
	}

	#[test]
	fn token_responses_without_lifetime_or_scope_use_fallbacks() {
		let requested = ScopeSet::new(["user"]).expect("Scope fixture should be valid.");
		let record = map_token_response(
			&key(),
			&requested,
			Some("old-refresh"),
			&response(r#"{"access_token":"a1","token_type":"bearer"}"#),
		)
		.expect("Minimal token response should map.");

		assert_eq!(record.access_token.expose(), "a1");
		assert_eq!(record.scope, requested);
		assert_eq!(record.expires_at, None);
		assert_eq!(record.refresh_token.as_ref().map(|s| s.expose()), Some("old-refresh"));
	}

	#[test]
	fn token_responses_record_granted_values() {
		let record = map_token_response(
			&key(),
			&ScopeSet::default(),
			Some("old-refresh"),
			&response(
				r#"{"access_token":"a2","token_type":"bearer","expires_in":3600,
				"refresh_token":"r2","scope":"user email"}"#,
			),
		)
		.expect("Full token response should map.");

		assert_eq!(record.scope.normalized(), "email user");
		assert_eq!(record.refresh_token.as_ref().map(|s| s.expose()), Some("r2"));
		assert_eq!(record.remaining_at(record.issued_at), Some(Duration::hours(1)));
	}

	#[test]
	fn zero_lifetime_is_rejected() {
		let err = map_token_response(
			&key(),
			&ScopeSet::default(),
			None,
			&response(r#"{"access_token":"a","token_type":"bearer","expires_in":0}"#),
		)
		.expect_err("Zero lifetime must be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::NonPositiveExpiresIn)));
	}

	#[test]
	fn generic_mapper_classifies_client_failures() {
		fn map(error: HttpClientError<std::io::Error>) -> Error {
			BasicTransportErrorMapper.map_transport_error(None, error)
		}

		assert!(matches!(
			map(HttpClientError::Io(std::io::Error::other("reset"))),
			Error::Transport(TransportError::Io(_))
		));
		assert!(matches!(
			map(HttpClientError::Other("boom".into())),
			Error::Transport(TransportError::Other { message }) if message == "boom"
		));
		assert!(matches!(
			map(HttpClientError::Reqwest(Box::new(std::io::Error::other("refused")))),
			Error::Transport(TransportError::Network { .. })
		));
	}
}
