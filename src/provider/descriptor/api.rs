// crates.io
use oauth2::http::Method;
// self
use crate::_prelude::*;

/// HTTP verbs accepted by [`Broker::api_request`](crate::flows::Broker::api_request).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiMethod {
	/// `GET`; parameters travel in the query string.
	#[default]
	Get,
	/// `POST`; parameters travel as a form body.
	Post,
	/// `PUT`; parameters travel as a form body.
	Put,
	/// `PATCH`; parameters travel as a form body.
	Patch,
	/// `DELETE`; parameters travel in the query string.
	Delete,
}
impl ApiMethod {
	/// Upper-case HTTP method name.
	pub fn as_str(self) -> &'static str {
		match self {
			ApiMethod::Get => "GET",
			ApiMethod::Post => "POST",
			ApiMethod::Put => "PUT",
			ApiMethod::Patch => "PATCH",
			ApiMethod::Delete => "DELETE",
		}
	}

	/// Whether parameters are encoded into the request body rather than the query string.
	pub fn carries_body(self) -> bool {
		matches!(self, ApiMethod::Post | ApiMethod::Put | ApiMethod::Patch)
	}

	pub(crate) fn to_http(self) -> Method {
		match self {
			ApiMethod::Get => Method::GET,
			ApiMethod::Post => Method::POST,
			ApiMethod::Put => Method::PUT,
			ApiMethod::Patch => Method::PATCH,
			ApiMethod::Delete => Method::DELETE,
		}
	}
}
impl Display for ApiMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Relative API call declared by a descriptor (e.g. the current-user endpoint).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoint {
	/// Path resolved against the descriptor's API base URL.
	pub path: String,
	/// HTTP verb used for the call.
	pub method: ApiMethod,
}
impl ApiEndpoint {
	/// Creates an endpoint for `method path`.
	pub fn new(method: ApiMethod, path: impl Into<String>) -> Self {
		Self { path: path.into(), method }
	}
}
