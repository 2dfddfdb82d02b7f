//! Pieces shared by several flows: refresh requests and per-session guards.

// crates.io
use async_lock::MutexGuard;
// self
use crate::{
	_prelude::*,
	auth::{SessionId, TokenRecord},
	flows::Broker,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	store::StoreKey,
};

/// Parameters for [`Broker::refresh_access_token`].
#[derive(Clone, Debug)]
pub struct TokenRequest {
	/// Session whose token should be refreshed.
	pub session: SessionId,
	/// Refresh even if the stored token is still fresh.
	pub force: bool,
	/// Refresh this long before expiry; a per-session jitter shortens it.
	pub preemptive_window: Duration,
}
impl TokenRequest {
	const DEFAULT_PREEMPTIVE_WINDOW: Duration = Duration::seconds(60);

	/// Request for `session` with a 60 second preemptive window.
	pub fn new(session: SessionId) -> Self {
		Self { session, force: false, preemptive_window: Self::DEFAULT_PREEMPTIVE_WINDOW }
	}

	/// Always refresh.
	pub fn force_refresh(mut self) -> Self {
		self.force = true;

		self
	}

	/// Sets the preemptive window; negative values become zero.
	pub fn with_preemptive_window(mut self, window: Duration) -> Self {
		self.preemptive_window = window.max(Duration::ZERO);

		self
	}

	/// Whether `record` needs refreshing at `now`.
	///
	/// Tokens without an expiry are refreshed only when forced or revoked.
	pub fn should_refresh(&self, record: &TokenRecord, now: OffsetDateTime) -> bool {
		if self.force || record.is_revoked() || record.is_expired_at(now) {
			return true;
		}

		match record.remaining_at(now) {
			Some(remaining) => {
				let window = self.effective_window();

				window.is_positive() && remaining <= window
			},
			None => false,
		}
	}

	fn effective_window(&self) -> Duration {
		let secs = self.preemptive_window.whole_seconds();

		if secs <= 1 {
			return self.preemptive_window;
		}

		let mut hasher = DefaultHasher::new();

		self.session.hash(&mut hasher);

		// `secs` is positive here, so the jitter stays within `0..secs`.
		let jitter = (hasher.finish() % secs.unsigned_abs()) as i64;

		self.preemptive_window - Duration::seconds(jitter)
	}
}

/// Lock table keyed by stored record.
pub(crate) type FlowGuards = Arc<Mutex<HashMap<StoreKey, Arc<AsyncMutex<()>>>>>;

/// Guard serializing flows that touch the same stored record.
///
/// Dropping the last guard for a key removes its entry from the table.
pub(crate) struct FlowGuard {
	guards: FlowGuards,
	key: StoreKey,
	lock: Arc<AsyncMutex<()>>,
}
impl FlowGuard {
	pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
		self.lock.lock().await
	}
}
impl Drop for FlowGuard {
	fn drop(&mut self) {
		let mut guards = self.guards.lock();

		// Clones are only taken under the table lock, so the count cannot grow here.
		if Arc::strong_count(&self.lock) == 2
			&& guards.get(&self.key).is_some_and(|lock| Arc::ptr_eq(lock, &self.lock))
		{
			guards.remove(&self.key);
		}
	}
}

pub(crate) fn flow_guard<C, M>(broker: &Broker<C, M>, key: &StoreKey) -> FlowGuard
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let lock = broker.flow_guards.lock().entry(key.clone()).or_default().clone();

	FlowGuard { guards: broker.flow_guards.clone(), key: key.clone(), lock }
}
