//! Validated identifiers for providers and end-user authentication sessions.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const IDENTIFIER_MAX_LEN: usize = 128;

macro_rules! def_id {
	($name:ident, $kind:literal, $doc:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates and wraps the provided value.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				Self::try_from(value.into())
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				check($kind, &value).map(|_| Self(value))
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", $kind, self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (provider, session).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (provider, session).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed length.
	#[error("{kind} identifier exceeds {max} bytes.")]
	TooLong {
		/// Kind of identifier (provider, session).
		kind: &'static str,
		/// Maximum permitted length.
		max: usize,
	},
}

def_id! { ProviderId, "Provider", "Identifier for an OAuth provider descriptor (e.g. `antcloud`)." }
def_id! {
	SessionId,
	"Session",
	"Identifier for one end-user session; it owns at most one token per provider."
}

fn check(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
	match value {
		"" => Err(IdentifierError::Empty { kind }),
		v if v.chars().any(char::is_whitespace) => Err(IdentifierError::ContainsWhitespace { kind }),
		v if v.len() > IDENTIFIER_MAX_LEN =>
			Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN }),
		_ => Ok(()),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn whitespace_and_empty_values_are_rejected() {
		assert_eq!(SessionId::new(""), Err(IdentifierError::Empty { kind: "Session" }));
		assert!(SessionId::new(" user-1").is_err());
		assert!(ProviderId::new("ant cloud").is_err());
		assert!(SessionId::new(format!("user{}1", '\u{00A0}')).is_err());

		let session = SessionId::new("user-1").expect("Session fixture should be valid.");

		assert_eq!(&*session, "user-1");
		assert_eq!(format!("{session:?}"), "Session(user-1)");
	}

	#[test]
	fn length_limit_is_inclusive() {
		ProviderId::new("p".repeat(IDENTIFIER_MAX_LEN)).expect("Exact length should succeed.");

		assert!(matches!(
			ProviderId::new("p".repeat(IDENTIFIER_MAX_LEN + 1)),
			Err(IdentifierError::TooLong { .. })
		));
	}

	#[test]
	fn deserialization_runs_validation() {
		let provider: ProviderId =
			serde_json::from_str("\"antcloud\"").expect("Provider should deserialize.");

		assert_eq!(provider.as_ref(), "antcloud");
		assert!(serde_json::from_str::<SessionId>("\"two words\"").is_err());

		let lookup: HashMap<SessionId, u8> =
			HashMap::from_iter([(SessionId::new("s-1").expect("Session should be valid."), 1)]);

		assert_eq!(lookup.get("s-1"), Some(&1));
	}
}
