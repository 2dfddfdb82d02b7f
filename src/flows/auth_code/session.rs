//! State and PKCE material carried between the authorize redirect and the code exchange.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, SessionId},
	provider::ProviderDescriptor,
};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// RFC 7636 `S256`.
	S256,
}
impl PkceCodeChallengeMethod {
	/// Wire name of the method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// An authorization in progress, returned by [`crate::flows::Broker::start_authorization`].
///
/// Keep it (for example in the user's web session) until the provider redirects back, then hand
/// it to [`crate::flows::Broker::complete_authorization`].
#[derive(Clone)]
pub struct AuthorizationSession {
	/// Session the resulting tokens will belong to.
	pub session: SessionId,
	/// Scope asked for in the authorize URL.
	pub scope: ScopeSet,
	/// Anti-forgery value the provider must echo back.
	pub state: String,
	/// Redirect URI used in the authorize URL; the exchange must repeat it.
	pub redirect_uri: Url,
	/// URL to send the user to.
	pub authorize_url: Url,
	pkce: PkcePair,
}
impl AuthorizationSession {
	/// PKCE challenge sent in the authorize URL.
	pub fn code_challenge(&self) -> &str {
		&self.pkce.challenge
	}

	/// PKCE challenge method.
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		self.pkce.method
	}

	/// Checks the `state` returned with the redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(Error::InvalidGrant { reason: "authorization state mismatch".into() })
		}
	}

	pub(crate) fn pkce_verifier(&self) -> &str {
		&self.pkce.verifier
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("session", &self.session)
			.field("scope", &self.scope)
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("authorize_url", &self.authorize_url)
			.field("code_challenge_method", &self.pkce.method)
			.finish()
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

pub(super) fn build_session(
	descriptor: &ProviderDescriptor,
	client_id: &str,
	session: SessionId,
	scope: ScopeSet,
	redirect_uri: Url,
) -> AuthorizationSession {
	let state = random_string(STATE_LEN);
	let pkce = PkcePair::generate();
	let mut authorize_url = descriptor.endpoints.authorization.clone();

	{
		let mut query = authorize_url.query_pairs_mut();

		query
			.append_pair("response_type", "code")
			.append_pair("client_id", client_id)
			.append_pair("redirect_uri", redirect_uri.as_str());

		if let Some(scope) = scope.join(descriptor.quirks.scope_delimiter) {
			query.append_pair("scope", &scope);
		}

		query
			.append_pair("state", &state)
			.append_pair("code_challenge", &pkce.challenge)
			.append_pair("code_challenge_method", pkce.method.as_str());
	}

	AuthorizationSession { session, scope, state, redirect_uri, authorize_url, pkce }
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
