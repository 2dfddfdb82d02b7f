//! Serializable adapter configuration.
//!
//! The shape mirrors the configuration array Hybridauth users already have:
//!
//! ```json
//! {
//! 	"callback": "https://app.example.com/oauth/callback",
//! 	"keys": { "id": "client-id", "secret": "client-secret" },
//! 	"scope": "user"
//! }
//! ```

// self
use crate::{_prelude::*, auth::ScopeSet, error::ConfigError};

/// Settings for one provider adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
	/// Redirect URI registered with the provider.
	pub callback: Url,
	/// OAuth client credentials.
	pub keys: ClientKeys,
	/// Scope override; the provider default applies when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
}
impl AdapterConfig {
	/// Creates a config with no scope override.
	pub fn new(callback: Url, keys: ClientKeys) -> Self {
		Self { callback, keys, scope: None }
	}

	/// Sets the scope override.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Checks that the credentials and scope are usable.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.keys.id.trim().is_empty() {
			return Err(ConfigError::InvalidConfig { reason: "`keys.id` must not be empty".into() });
		}

		self.scope()?;

		Ok(())
	}

	/// Parses the scope override, accepting space- or comma-separated lists.
	///
	/// Blank strings count as no override.
	pub fn scope(&self) -> Result<Option<ScopeSet>, ConfigError> {
		match self.scope.as_deref().map(str::trim) {
			None | Some("") => Ok(None),
			Some(raw) => Ok(Some(ScopeSet::from_str(raw)?)),
		}
	}
}

/// Client identifier and secret issued by the provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientKeys {
	/// Client identifier.
	pub id: String,
	/// Client secret, if the client is confidential.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub secret: Option<String>,
}
impl ClientKeys {
	/// Keys for a confidential client.
	pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
		Self { id: id.into(), secret: Some(secret.into()) }
	}
}
impl Debug for ClientKeys {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientKeys")
			.field("id", &self.id)
			.field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn config() -> AdapterConfig {
		AdapterConfig::new(
			Url::parse("https://app.example.com/callback").expect("Callback should parse."),
			ClientKeys::new("abc", "xyz"),
		)
	}

	#[test]
	fn deserializes_the_familiar_shape() {
		let config: AdapterConfig = serde_json::from_str(
			r#"{"callback":"https://app.example.com/callback","keys":{"id":"abc","secret":"xyz"}}"#,
		)
		.expect("Config should deserialize.");

		assert_eq!(config, self::config());
		assert_eq!(config.scope().expect("Missing scope is fine."), None);
	}

	#[test]
	fn validation_rejects_blank_ids_and_bad_scopes() {
		let mut blank = config();

		blank.keys.id = "  ".into();

		assert!(matches!(blank.validate(), Err(ConfigError::InvalidConfig { .. })));
		assert!(matches!(
			config().with_scope(" , ").validate(),
			Err(ConfigError::InvalidScope(_))
		));

		let scoped = config().with_scope("user, email");

		assert_eq!(
			scoped.scope().expect("Scope should parse.").map(|scope| scope.normalized()),
			Some("email user".into())
		);
	}

	#[test]
	fn debug_redacts_the_secret() {
		let rendered = format!("{:?}", config());

		assert!(rendered.contains("abc"));
		assert!(!rendered.contains("xyz"));
	}
}
