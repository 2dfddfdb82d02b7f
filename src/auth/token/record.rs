//! Token records stored per provider/session pair.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, ScopeSet, SessionId, token::secret::TokenSecret},
};

/// Lifecycle status for a token record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token can be used.
	Active,
	/// Token reached its expiry instant.
	Expired,
	/// Token was revoked locally or by the provider.
	Revoked,
}

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when the expiry precedes the issued-at instant.
	#[error("Token expiry precedes its issued-at instant.")]
	ExpiryBeforeIssue,
}

/// Tokens issued to one session by one provider.
///
/// Providers are not required to send `expires_in`; such tokens carry no expiry and are treated
/// as valid until the provider rejects them.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Provider that minted the tokens.
	pub provider: ProviderId,
	/// Session the tokens belong to.
	pub session: SessionId,
	/// Scopes granted by the provider (or requested, when the provider is silent).
	pub scope: ScopeSet,
	/// Access token secret.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Instant the tokens were received.
	pub issued_at: OffsetDateTime,
	/// Expiry instant, when the provider supplied a lifetime.
	pub expires_at: Option<OffsetDateTime>,
	/// Revocation instant if the record has been revoked.
	pub revoked_at: Option<OffsetDateTime>,
}
impl TokenRecord {
	/// Returns a builder for the provided provider/session pair.
	pub fn builder(provider: ProviderId, session: SessionId) -> TokenRecordBuilder {
		TokenRecordBuilder {
			provider,
			session,
			scope: ScopeSet::default(),
			access_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		match (self.revoked_at, self.expires_at) {
			(Some(_), _) => TokenStatus::Revoked,
			(None, Some(expiry)) if instant >= expiry => TokenStatus::Expired,
			_ => TokenStatus::Active,
		}
	}

	/// Returns `true` if the record has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Returns `true` if the record has been revoked.
	pub fn is_revoked(&self) -> bool {
		self.revoked_at.is_some()
	}

	/// Time left before expiry at `instant`; `None` when the token never expires.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Option<Duration> {
		self.expires_at.map(|expiry| expiry - instant)
	}

	/// Marks the record as revoked.
	pub fn revoke(&mut self, instant: OffsetDateTime) {
		self.revoked_at = Some(instant);
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("provider", &self.provider)
			.field("session", &self.session)
			.field("scope", &self.scope)
			.field("access_token", &self.access_token)
			.field("refresh_token", &self.refresh_token)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("revoked_at", &self.revoked_at)
			.finish()
	}
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	provider: ProviderId,
	session: SessionId,
	scope: ScopeSet,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenRecordBuilder {
	/// Sets the granted scope.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the issued-at instant (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a lifetime relative to the issued-at instant.
	pub fn expires_in(mut self, lifetime: Duration) -> Self {
		self.expires_in = Some(lifetime);

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self.access_token.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = self.expires_at.or_else(|| self.expires_in.map(|delta| issued_at + delta));

		if expires_at.is_some_and(|expiry| expiry < issued_at) {
			return Err(TokenRecordBuilderError::ExpiryBeforeIssue);
		}

		Ok(TokenRecord {
			provider: self.provider,
			session: self.session,
			scope: self.scope,
			access_token,
			refresh_token: self.refresh_token,
			issued_at,
			expires_at,
			revoked_at: None,
		})
	}
}
