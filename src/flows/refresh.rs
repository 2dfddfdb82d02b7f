//! Refresh token grant.
//!
//! [`Broker::refresh_access_token`] serializes refreshes per session, keeps tokens that are still
//! fresh, and rotates the stored record with a compare-and-swap on the old refresh token. A
//! rejected refresh token revokes the stored record so it is not tried again.

// self
use crate::{
	_prelude::*,
	auth::TokenRecord,
	error::ConfigError,
	flows::{Broker, TokenRequest, common},
	http::TokenHttpClient,
	oauth::{BasicFacade, OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind},
	provider::GrantType,
	store::{CompareAndSwapOutcome, StoreKey},
};

impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns a usable token for the request's session, refreshing it when needed.
	///
	/// Fails with [`Error::NotConnected`] when nothing is stored, [`Error::Revoked`] when the
	/// stored token was revoked, and [`ConfigError::MissingRefreshToken`] when a refresh is due
	/// but impossible.
	pub async fn refresh_access_token(&self, request: TokenRequest) -> Result<TokenRecord> {
		obs::observe(FlowKind::Refresh, "refresh_access_token", async {
			self.ensure_grant(GrantType::RefreshToken)?;

			let key = StoreKey::new(&self.descriptor.id, &request.session);
			let guard = common::flow_guard(self, &key);
			let _singleflight = guard.lock().await;
			let current = self
				.store
				.fetch(&key)
				.await?
				.ok_or_else(|| Error::NotConnected { session: request.session.to_string() })?;
			let now = OffsetDateTime::now_utc();

			if current.is_revoked() {
				return Err(Error::Revoked);
			}
			if !request.should_refresh(&current, now) {
				return Ok(current);
			}

			self.rotate(&key, current, now).await
		})
		.await
	}

	/// Runs the refresh grant for `current`. The caller holds the session guard.
	pub(crate) async fn rotate(
		&self,
		key: &StoreKey,
		current: TokenRecord,
		now: OffsetDateTime,
	) -> Result<TokenRecord> {
		let expected = current
			.refresh_token
			.as_ref()
			.map(|secret| secret.expose().to_owned())
			.ok_or(ConfigError::MissingRefreshToken)?;
		let facade = <BasicFacade<C, M>>::from_descriptor(
			&self.descriptor,
			&self.client_id,
			self.client_secret.as_deref(),
			None,
			&self.token_headers,
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)?;
		let refreshed =
			match facade.refresh_token(self.strategy.as_ref(), key, &expected, &current.scope).await
			{
				Ok(record) => record,
				Err(err @ (Error::InvalidGrant { .. } | Error::Revoked)) => {
					obs::flow_warn!(
						session = %key.session,
						"Refresh token was rejected; revoking the stored record."
					);

					self.store.revoke(key, now).await?;

					return Err(err);
				},
				Err(err) => return Err(err),
			};

		match self.store.compare_and_swap_refresh(key, Some(&expected), refreshed.clone()).await? {
			CompareAndSwapOutcome::Updated => Ok(refreshed),
			CompareAndSwapOutcome::Missing => {
				self.store.save(refreshed.clone()).await?;

				Ok(refreshed)
			},
			// Someone else rotated first; theirs wins.
			CompareAndSwapOutcome::RefreshMismatch =>
				Ok(self.store.fetch(key).await?.unwrap_or(refreshed)),
		}
	}
}
