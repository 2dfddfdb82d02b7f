//! Bearer-authenticated calls to the provider's API.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpRequest, HttpResponse,
	http::{
		HeaderValue, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use url::form_urlencoded::Serializer;
// self
use crate::{
	_prelude::*,
	auth::{SessionId, TokenRecord},
	error::ConfigError,
	flows::{Broker, TokenRequest},
	http::{self, ResponseMetadataSlot, TokenHttpClient},
	oauth::TransportErrorMapper,
	obs::{self, FlowKind},
	provider::{ApiMethod, GrantType, strategy},
};

const BODY_PREVIEW_LIMIT: usize = 256;

impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Calls the provider API on behalf of `session` and returns the decoded JSON body.
	///
	/// `path` is resolved against the descriptor's API base; absolute `https` URLs are used as
	/// given. `params` go into the query string for `GET` and `DELETE` and into a form body
	/// otherwise. An expired token is refreshed first when that is possible. An empty success
	/// body decodes to `null`.
	pub async fn api_request(
		&self,
		session: &SessionId,
		path: &str,
		method: ApiMethod,
		params: &BTreeMap<String, String>,
	) -> Result<JsonValue> {
		obs::observe(FlowKind::ApiRequest, "api_request", async {
			let url = self.descriptor.api_url(path)?;
			let record = self.usable_token(session).await?;
			let request = build_request(url.clone(), method, params, &record)?;
			let meta = ResponseMetadataSlot::default();
			let handle = self.http_client.with_metadata(meta.clone());
			let response = handle.call(request).await.map_err(|err| {
				self.transport_mapper.map_transport_error(meta.take().as_ref(), err)
			})?;

			decode_response(&url, response)
		})
		.await
	}

	async fn usable_token(&self, session: &SessionId) -> Result<TokenRecord> {
		let record = self
			.store
			.fetch(&self.store_key(session))
			.await?
			.ok_or_else(|| Error::NotConnected { session: session.to_string() })?;

		if record.is_revoked() {
			return Err(Error::Revoked);
		}
		if record.is_expired_at(OffsetDateTime::now_utc())
			&& record.refresh_token.is_some()
			&& self.descriptor.supports(GrantType::RefreshToken)
		{
			obs::flow_debug!(session = %session, "Access token expired; refreshing first.");

			return self
				.refresh_access_token(
					TokenRequest::new(session.clone()).with_preemptive_window(Duration::ZERO),
				)
				.await;
		}

		Ok(record)
	}
}

fn build_request(
	mut url: Url,
	method: ApiMethod,
	params: &BTreeMap<String, String>,
	record: &TokenRecord,
) -> Result<HttpRequest> {
	let body = if method.carries_body() {
		Serializer::new(String::new()).extend_pairs(params).finish().into_bytes()
	} else {
		if !params.is_empty() {
			url.query_pairs_mut().extend_pairs(params);
		}

		Vec::new()
	};
	let mut bearer = HeaderValue::try_from(format!("Bearer {}", record.access_token.expose()))
		.map_err(|_| ConfigError::InvalidHeader { name: AUTHORIZATION.to_string() })?;

	bearer.set_sensitive(true);

	let mut builder = Request::builder()
		.method(method.to_http())
		.uri(url.as_str())
		.header(AUTHORIZATION, bearer)
		.header(ACCEPT, "application/json");

	if method.carries_body() {
		builder = builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
	}

	Ok(builder.body(body).map_err(ConfigError::from)?)
}

fn decode_response(url: &Url, response: HttpResponse) -> Result<JsonValue> {
	let status = response.status();

	if !status.is_success() {
		return Err(Error::ApiStatus {
			url: url.to_string(),
			status: status.as_u16(),
			retry_after: http::parse_retry_after(response.headers(), OffsetDateTime::now_utc()),
			body_preview: strategy::preview(
				&String::from_utf8_lossy(response.body()),
				BODY_PREVIEW_LIMIT,
			),
		});
	}
	if response.body().iter().all(u8::is_ascii_whitespace) {
		return Ok(JsonValue::Null);
	}

	serde_json::from_slice(response.body()).map_err(|err| Error::UnexpectedApiResponse {
		reason: format!("body is not valid JSON ({err})"),
	})
}
