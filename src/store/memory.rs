//! Thread-safe in-memory [`TokenStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSecret},
	store::{CompareAndSwapOutcome, StoreError, StoreFuture, StoreKey, TokenStore},
};

/// Keeps records in-process; cloning shares the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<HashMap<StoreKey, TokenRecord>>>);
impl MemoryStore {
	/// Number of stored records.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn ready<'a, T>(value: T) -> StoreFuture<'a, T>
	where
		T: 'a + Send,
	{
		Box::pin(async move { Ok::<_, StoreError>(value) })
	}
}
impl TokenStore for MemoryStore {
	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		self.0.write().insert(StoreKey::of(&record), record);

		Self::ready(())
	}

	fn fetch<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<TokenRecord>> {
		Self::ready(self.0.read().get(key).cloned())
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		key: &'a StoreKey,
		expected_refresh: Option<&'a str>,
		replacement: TokenRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let mut map = self.0.write();
		let outcome = match map.get(key) {
			None => CompareAndSwapOutcome::Missing,
			Some(current)
				if current.refresh_token.as_ref().map(TokenSecret::expose) == expected_refresh =>
				CompareAndSwapOutcome::Updated,
			Some(_) => CompareAndSwapOutcome::RefreshMismatch,
		};

		if outcome == CompareAndSwapOutcome::Updated {
			map.insert(key.clone(), replacement);
		}

		Self::ready(outcome)
	}

	fn revoke<'a>(
		&'a self,
		key: &'a StoreKey,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<TokenRecord>> {
		let revoked = self.0.write().get_mut(key).map(|record| {
			record.revoke(instant);

			record.clone()
		});

		Self::ready(revoked)
	}

	fn remove<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<TokenRecord>> {
		Self::ready(self.0.write().remove(key))
	}
}
