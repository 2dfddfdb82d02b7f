//! Inspecting and managing the token stored for a session.

// self
use crate::{
	_prelude::*,
	auth::{SessionId, TokenRecord},
	error::ConfigError,
	flows::{Broker, common},
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	store::StoreKey,
};

impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Whether `session` holds a token that is neither revoked nor expired.
	pub async fn is_connected(&self, session: &SessionId) -> Result<bool> {
		let now = OffsetDateTime::now_utc();

		Ok(self
			.store
			.fetch(&self.store_key(session))
			.await?
			.is_some_and(|record| !record.is_revoked() && !record.is_expired_at(now)))
	}

	/// The stored token for `session`, if any.
	pub async fn access_token(&self, session: &SessionId) -> Result<Option<TokenRecord>> {
		Ok(self.store.fetch(&self.store_key(session)).await?)
	}

	/// Imports a token obtained elsewhere, replacing whatever the session held.
	///
	/// The record must belong to this broker's provider.
	pub async fn store_access_token(&self, record: TokenRecord) -> Result<()> {
		if record.provider != self.descriptor.id {
			return Err(ConfigError::InvalidConfig {
				reason: format!(
					"token belongs to provider `{}`, not `{}`",
					record.provider, self.descriptor.id
				),
			}
			.into());
		}

		let key = StoreKey::of(&record);
		let guard = common::flow_guard(self, &key);
		let _singleflight = guard.lock().await;

		self.store.save(record).await?;

		Ok(())
	}

	/// Forgets the session's token. Returns whether one was stored.
	pub async fn disconnect(&self, session: &SessionId) -> Result<bool> {
		let key = self.store_key(session);
		let guard = common::flow_guard(self, &key);
		let _singleflight = guard.lock().await;

		Ok(self.store.remove(&key).await?.is_some())
	}

	pub(crate) fn store_key(&self, session: &SessionId) -> StoreKey {
		StoreKey::new(&self.descriptor.id, session)
	}
}
