//! HTTP plumbing shared by token requests and provider API calls.
//!
//! [`TokenHttpClient`] is the only seam between the adapter and an HTTP stack. Each request gets
//! a handle bound to a fresh [`ResponseMetadataSlot`]; the handle records the status and any
//! `Retry-After` hint there so error mapping can use them after the call resolves.
//! [`TokenHeaders`] holds the extra headers sent to the token endpoint, one map per grant.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{HeaderMap, HeaderName, HeaderValue, header::RETRY_AFTER},
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError, provider::GrantType};

/// HTTP stack used for token exchanges and provider API calls.
///
/// Implementations are shared behind `Arc` across flows, so they must be `Send + Sync +
/// 'static`. The handles they hand out must own their state; request futures are boxed and
/// moved between tasks.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Error produced by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Per-request [`AsyncHttpClient`] bound to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Returns a handle that reports into `slot`.
	///
	/// Handles clear the slot with [`ResponseMetadataSlot::take`] before sending and call
	/// [`ResponseMetadataSlot::store`] as soon as a response status is known, whether or not
	/// the status is a success.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// What the transport learned from the last response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: Option<u16>,
	/// `Retry-After` hint as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Shared cell the transport writes [`ResponseMetadata`] into.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Replaces the stored metadata.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Removes and returns the stored metadata.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Extra headers sent with token endpoint requests, keyed by header name.
///
/// `exchange` goes with authorization code exchanges and `refresh` with refresh grants. The
/// values usually carry client credentials, so `Debug` prints header names only.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TokenHeaders {
	/// Headers for the authorization code exchange.
	pub exchange: BTreeMap<String, String>,
	/// Headers for the refresh grant.
	pub refresh: BTreeMap<String, String>,
}
impl TokenHeaders {
	/// Headers used for `grant`.
	pub fn for_grant(&self, grant: GrantType) -> &BTreeMap<String, String> {
		match grant {
			GrantType::AuthorizationCode => &self.exchange,
			GrantType::RefreshToken => &self.refresh,
		}
	}

	/// Mutable access to the headers used for `grant`.
	pub fn for_grant_mut(&mut self, grant: GrantType) -> &mut BTreeMap<String, String> {
		match grant {
			GrantType::AuthorizationCode => &mut self.exchange,
			GrantType::RefreshToken => &mut self.refresh,
		}
	}
}
impl Debug for TokenHeaders {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenHeaders")
			.field("exchange", &self.exchange.keys().collect::<Vec<_>>())
			.field("refresh", &self.refresh.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Converts configured headers into an HTTP header map.
pub(crate) fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ConfigError> {
	let mut map = HeaderMap::with_capacity(headers.len());

	for (name, value) in headers {
		let invalid = || ConfigError::InvalidHeader { name: name.clone() };
		let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
		let mut header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;

		header_value.set_sensitive(true);
		map.insert(header_name, header_value);
	}

	Ok(map)
}

/// Wraps a handle and stamps fixed headers onto every request it sends.
///
/// Headers already on the request are overwritten.
pub(crate) struct HeaderInjector<H> {
	inner: H,
	headers: HeaderMap,
}
impl<H> HeaderInjector<H> {
	pub(crate) fn new(inner: H, headers: HeaderMap) -> Self {
		Self { inner, headers }
	}
}
impl<'c, H> AsyncHttpClient<'c> for HeaderInjector<H>
where
	H: AsyncHttpClient<'c>,
{
	type Error = H::Error;
	type Future = H::Future;

	fn call(&'c self, mut request: HttpRequest) -> Self::Future {
		for (name, value) in &self.headers {
			request.headers_mut().insert(name.clone(), value.clone());
		}

		self.inner.call(request)
	}
}

/// Reqwest-backed [`TokenHttpClient`].
///
/// OAuth token endpoints answer directly, so a custom [`ReqwestClient`] passed in here should
/// have redirect following disabled.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client that never follows redirects.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ReqwestHandle(Arc::new((self.0.clone(), slot)))
	}
}

/// Handle produced by [`ReqwestHttpClient::with_metadata`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHandle(Arc<(ReqwestClient, ResponseMetadataSlot)>);
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let inner = Arc::clone(&self.0);

		Box::pin(async move {
			let (client, slot) = &*inner;

			slot.take();

			let response =
				client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			slot.store(ResponseMetadata {
				status: Some(status.as_u16()),
				retry_after: parse_retry_after(&headers, OffsetDateTime::now_utc()),
			});

			let mut converted =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

/// Reads `Retry-After` as either delta-seconds or an HTTP date relative to `now`.
pub(crate) fn parse_retry_after(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}

	let delta = OffsetDateTime::parse(raw, &Rfc2822).ok()? - now;

	delta.is_positive().then_some(delta)
}
