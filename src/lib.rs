//! Composable OAuth 2.0 provider adapters. Describe a provider as data, plug in a profile mapper,
//! and get authorization, refresh, token storage, and signed API calls from one generic client.
//!
//! The generic client lives in [`flows::Broker`]; provider-specific knowledge is expressed as a
//! [`provider::ProviderDescriptor`] plus a [`profile::ProfileMapper`]. See
//! [`providers::antcloud`] for a complete adapter.

#![deny(clippy::all, missing_docs)]
#![cfg_attr(not(test), deny(unused_crate_dependencies))]

pub mod auth;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod profile;
pub mod provider;
pub mod providers;
pub mod store;
#[cfg(any(test, feature = "test"))]
#[doc(hidden)]
pub mod _preludet {
	//! Re-exports and fixtures shared by unit and integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// crates.io
	use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http::StatusCode};
	// self
	use crate::{
		flows::Broker,
		http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
		oauth::BasicTransportErrorMapper,
		provider::{DefaultProviderStrategy, ProviderDescriptor},
		store::{MemoryStore, TokenStore},
	};
	#[cfg(feature = "reqwest")]
	use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

	/// Broker running on [`ScriptedHttpClient`].
	pub type ScriptedBroker = Broker<ScriptedHttpClient, BasicTransportErrorMapper>;
	/// Broker running on the reqwest transport.
	#[cfg(feature = "reqwest")]
	pub type ReqwestTestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Request captured by [`ScriptedHttpClient`].
	#[derive(Clone, Debug, PartialEq, Eq)]
	pub struct RecordedRequest {
		/// HTTP method.
		pub method: String,
		/// Full request URL.
		pub url: String,
		/// Headers, keyed by lowercase name.
		pub headers: BTreeMap<String, String>,
		/// Body decoded as UTF-8.
		pub body: String,
	}
	impl RecordedRequest {
		/// Value of header `name` (lowercase).
		pub fn header(&self, name: &str) -> Option<&str> {
			self.headers.get(name).map(String::as_str)
		}
	}

	#[derive(Debug, Default)]
	struct Script {
		responses: VecDeque<(u16, String)>,
		requests: Vec<RecordedRequest>,
	}

	/// Transport that answers from a queue of canned responses, whatever the host.
	///
	/// Clones share the same queue and request log.
	#[derive(Clone, Debug, Default)]
	pub struct ScriptedHttpClient(Arc<Mutex<Script>>);
	impl ScriptedHttpClient {
		/// Queues a response.
		pub fn respond(&self, status: u16, body: impl Into<String>) -> &Self {
			self.0.lock().responses.push_back((status, body.into()));

			self
		}

		/// Requests sent so far, oldest first.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.0.lock().requests.clone()
		}
	}
	impl TokenHttpClient for ScriptedHttpClient {
		type Handle = ScriptedHandle;
		type TransportError = std::io::Error;

		fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
			ScriptedHandle { script: self.clone(), slot }
		}
	}

	/// Handle produced by [`ScriptedHttpClient`].
	#[derive(Debug)]
	pub struct ScriptedHandle {
		script: ScriptedHttpClient,
		slot: ResponseMetadataSlot,
	}
	impl<'c> AsyncHttpClient<'c> for ScriptedHandle {
		type Error = HttpClientError<std::io::Error>;
		type Future =
			Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

		fn call(&'c self, request: HttpRequest) -> Self::Future {
			let recorded = RecordedRequest {
				method: request.method().to_string(),
				url: request.uri().to_string(),
				headers: request
					.headers()
					.iter()
					.map(|(name, value)| {
						(name.as_str().to_owned(), String::from_utf8_lossy(value.as_bytes()).into())
					})
					.collect(),
				body: String::from_utf8_lossy(request.body()).into_owned(),
			};
			let next = {
				let mut script = self.script.0.lock();

				script.requests.push(recorded);
				script.responses.pop_front()
			};

			Box::pin(async move {
				self.slot.take();

				let (status, body) = next.ok_or_else(|| {
					HttpClientError::Other("No scripted response is queued.".into())
				})?;
				let status = StatusCode::from_u16(status).map_err(|e| {
					HttpClientError::Other(format!("Scripted status is invalid: {e}."))
				})?;

				self.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after: None });

				let mut response = HttpResponse::new(body.into_bytes());

				*response.status_mut() = status;
				response.headers_mut().insert(
					oauth2::http::header::CONTENT_TYPE,
					oauth2::http::HeaderValue::from_static("application/json"),
				);

				Ok(response)
			})
		}
	}

	/// Builds a [`ScriptedBroker`] backed by a fresh [`MemoryStore`].
	pub fn build_scripted_broker(
		descriptor: ProviderDescriptor,
		client_id: &str,
		client_secret: &str,
	) -> (ScriptedBroker, ScriptedHttpClient, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::default());
		let http_client = ScriptedHttpClient::default();
		let broker = Broker::with_http_client(
			store.clone() as Arc<dyn TokenStore>,
			descriptor,
			Arc::new(DefaultProviderStrategy),
			client_id,
			http_client.clone(),
			BasicTransportErrorMapper,
		)
		.with_client_secret(client_secret);

		(broker, http_client, store)
	}

	/// Reqwest client that trusts the self-signed certificates served by `httpmock`.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Insecure reqwest client for tests should build.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds a reqwest-backed broker with a fresh [`MemoryStore`].
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_broker(
		descriptor: ProviderDescriptor,
		client_id: &str,
		client_secret: &str,
	) -> (ReqwestTestBroker, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::default());
		let broker = Broker::with_http_client(
			store.clone() as Arc<dyn TokenStore>,
			descriptor,
			Arc::new(DefaultProviderStrategy),
			client_id,
			test_reqwest_http_client(),
			ReqwestTransportErrorMapper,
		)
		.with_client_secret(client_secret);

		(broker, store)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, hash_map::DefaultHasher},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value as JsonValue;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
