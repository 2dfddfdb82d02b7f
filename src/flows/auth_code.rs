//! Authorization Code grant with state and PKCE.
//!
//! [`Broker::start_authorization`] produces the URL to send the user to. Once the provider
//! redirects back, [`Broker::complete_authorization`] (or
//! [`Broker::complete_authorization_from_redirect`] when you hold the whole redirect URL) checks
//! the state, exchanges the code, and stores the tokens.

mod session;

pub use session::*;

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, SessionId, TokenRecord},
	error::ConfigError,
	flows::{Broker, common},
	http::TokenHttpClient,
	oauth::{BasicFacade, OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind},
	provider::GrantType,
	store::StoreKey,
};

impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Starts an authorization for `session` using the configured callback and scope.
	pub fn start_authorization(&self, session: SessionId) -> Result<AuthorizationSession> {
		let redirect_uri = self.callback.clone().ok_or(ConfigError::MissingCallback)?;

		self.start_authorization_with(session, self.effective_scope().clone(), redirect_uri)
	}

	/// Starts an authorization with an explicit scope and redirect URI.
	pub fn start_authorization_with(
		&self,
		session: SessionId,
		scope: ScopeSet,
		redirect_uri: Url,
	) -> Result<AuthorizationSession> {
		self.ensure_grant(GrantType::AuthorizationCode)?;

		Ok(session::build_session(
			&self.descriptor,
			&self.client_id,
			session,
			scope,
			redirect_uri,
		))
	}

	/// Exchanges `code` for tokens and stores them under the authorization's session.
	///
	/// The state is not checked here; use [`Broker::complete_authorization`] for that.
	pub async fn exchange_code(
		&self,
		authorization: AuthorizationSession,
		code: &str,
	) -> Result<TokenRecord> {
		obs::observe(FlowKind::AuthorizationCode, "exchange_code", async {
			self.ensure_grant(GrantType::AuthorizationCode)?;

			let key = StoreKey::new(&self.descriptor.id, &authorization.session);
			let guard = common::flow_guard(self, &key);
			let _singleflight = guard.lock().await;
			let facade = <BasicFacade<C, M>>::from_descriptor(
				&self.descriptor,
				&self.client_id,
				self.client_secret.as_deref(),
				Some(&authorization.redirect_uri),
				&self.token_headers,
				self.http_client.clone(),
				self.transport_mapper.clone(),
			)?;
			let record = facade
				.exchange_authorization_code(
					self.strategy.as_ref(),
					&key,
					code,
					authorization.pkce_verifier(),
					&authorization.scope,
					&authorization.redirect_uri,
				)
				.await?;

			self.store.save(record.clone()).await?;

			obs::flow_debug!(session = %authorization.session, "Stored tokens from code exchange.");

			Ok(record)
		})
		.await
	}

	/// Checks `returned_state` and then exchanges `code`.
	pub async fn complete_authorization(
		&self,
		authorization: AuthorizationSession,
		returned_state: &str,
		code: &str,
	) -> Result<TokenRecord> {
		authorization.validate_state(returned_state)?;

		self.exchange_code(authorization, code).await
	}

	/// Finishes an authorization from the URL the provider redirected to.
	///
	/// An `error` parameter in the redirect fails with [`Error::InvalidGrant`], as do a missing
	/// `code` and a missing or mismatched `state`.
	pub async fn complete_authorization_from_redirect(
		&self,
		authorization: AuthorizationSession,
		redirect: &Url,
	) -> Result<TokenRecord> {
		let params = redirect.query_pairs().into_owned().collect::<HashMap<_, _>>();

		if let Some(error) = params.get("error") {
			let reason = match params.get("error_description") {
				Some(description) => format!("{error}: {description}"),
				None => error.clone(),
			};

			return Err(Error::InvalidGrant { reason });
		}

		let state = params.get("state").map(String::as_str).unwrap_or_default();
		let code = params
			.get("code")
			.filter(|code| !code.is_empty())
			.ok_or_else(|| Error::InvalidGrant { reason: "redirect carries no code".into() })?;

		self.complete_authorization(authorization, state, code).await
	}

	pub(crate) fn ensure_grant(&self, grant: GrantType) -> Result<()> {
		if self.descriptor.supports(grant) {
			Ok(())
		} else {
			Err(ConfigError::UnsupportedGrant {
				descriptor: self.descriptor.id.to_string(),
				grant: grant.as_str(),
			}
			.into())
		}
	}
}
