//! Normalized user profiles and the mappers that build them from provider payloads.

// self
use crate::_prelude::*;

/// Provider-neutral description of the authenticated user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	/// Provider-assigned user identifier; always present.
	pub identifier: String,
	/// Human-readable name.
	pub display_name: Option<String>,
	/// Email address, passed through without validation.
	pub email: Option<String>,
}

/// Turns a provider's user-info payload into a [`UserProfile`].
///
/// Any `Fn(&JsonValue) -> Result<UserProfile>` closure or function is a mapper.
pub trait ProfileMapper
where
	Self: Send + Sync,
{
	/// Maps `payload`; fails with [`Error::UnexpectedApiResponse`] when it cannot be read.
	fn map_profile(&self, payload: &JsonValue) -> Result<UserProfile>;
}
impl<F> ProfileMapper for F
where
	F: Send + Sync + Fn(&JsonValue) -> Result<UserProfile>,
{
	fn map_profile(&self, payload: &JsonValue) -> Result<UserProfile> {
		self(payload)
	}
}

/// Renders a JSON scalar as text.
///
/// Strings are returned as-is, numbers and booleans in their JSON form. `null`, arrays, and
/// objects yield `None`.
pub fn scalar_text(value: &JsonValue) -> Option<String> {
	match value {
		JsonValue::String(s) => Some(s.clone()),
		JsonValue::Number(n) => Some(n.to_string()),
		JsonValue::Bool(b) => Some(b.to_string()),
		JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
	}
}
