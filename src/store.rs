//! Storage contracts and the built-in in-memory token store.

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, SessionId, TokenRecord},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for adapter-issued tokens.
///
/// Each provider/session pair owns at most one record.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the record for its provider/session pair.
	fn save(&self, record: TokenRecord) -> StoreFuture<'_, ()>;

	/// Fetches the record for `key`, if present.
	fn fetch<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Replaces the record only if its refresh secret still equals `expected_refresh`.
	fn compare_and_swap_refresh<'a>(
		&'a self,
		key: &'a StoreKey,
		expected_refresh: Option<&'a str>,
		replacement: TokenRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;

	/// Marks the record as revoked at `instant`, returning the updated record.
	fn revoke<'a>(
		&'a self,
		key: &'a StoreKey,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Deletes the record, returning it when one existed.
	fn remove<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<TokenRecord>>;
}

/// Result of a refresh-token compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The refresh secret matched and the record was replaced.
	Updated,
	/// The record exists but holds a different refresh secret.
	RefreshMismatch,
	/// No record exists for the key.
	Missing,
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Unique key identifying a stored token record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKey {
	/// Provider that minted the token.
	pub provider: ProviderId,
	/// Session that owns the token.
	pub session: SessionId,
}
impl StoreKey {
	/// Builds a key for the provider/session pair.
	pub fn new(provider: &ProviderId, session: &SessionId) -> Self {
		Self { provider: provider.clone(), session: session.clone() }
	}

	/// Key under which `record` is stored.
	pub fn of(record: &TokenRecord) -> Self {
		Self::new(&record.provider, &record.session)
	}
}
