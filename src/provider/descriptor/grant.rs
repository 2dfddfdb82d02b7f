// self
use crate::_prelude::*;

/// Grants a [`crate::flows::Broker`] knows how to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// `authorization_code`, always paired with PKCE.
	AuthorizationCode,
	/// `refresh_token`.
	RefreshToken,
}
impl GrantType {
	const ALL: [GrantType; 2] = [GrantType::AuthorizationCode, GrantType::RefreshToken];

	/// Wire value of `grant_type`.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}

	const fn bit(self) -> u8 {
		1 << self as u8
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Set of grants a descriptor enables.
///
/// Serialized as a list of wire names, e.g. `["authorization_code", "refresh_token"]`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<GrantType>", into = "Vec<GrantType>")]
pub struct SupportedGrants(u8);
impl SupportedGrants {
	/// Whether `grant` is enabled.
	pub fn supports(self, grant: GrantType) -> bool {
		self.0 & grant.bit() != 0
	}

	/// Returns the set with `grant` added.
	pub fn enable(self, grant: GrantType) -> Self {
		Self(self.0 | grant.bit())
	}

	/// No grant is enabled.
	pub fn is_empty(self) -> bool {
		self.0 == 0
	}

	/// Enabled grants in declaration order.
	pub fn iter(self) -> impl Iterator<Item = GrantType> {
		GrantType::ALL.into_iter().filter(move |grant| self.supports(*grant))
	}
}
impl Debug for SupportedGrants {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_set().entries(self.iter()).finish()
	}
}
impl From<Vec<GrantType>> for SupportedGrants {
	fn from(grants: Vec<GrantType>) -> Self {
		grants.into_iter().fold(Self::default(), Self::enable)
	}
}
impl From<SupportedGrants> for Vec<GrantType> {
	fn from(grants: SupportedGrants) -> Self {
		grants.iter().collect()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn grants_serialize_as_wire_names() {
		let grants = SupportedGrants::default().enable(GrantType::RefreshToken);

		assert!(grants.supports(GrantType::RefreshToken));
		assert!(!grants.supports(GrantType::AuthorizationCode));
		assert_eq!(
			serde_json::to_string(&grants).expect("Grants should serialize."),
			r#"["refresh_token"]"#
		);

		let parsed: SupportedGrants =
			serde_json::from_str(r#"["authorization_code","refresh_token","refresh_token"]"#)
				.expect("Grants should deserialize.");

		assert_eq!(parsed.iter().collect::<Vec<_>>(), GrantType::ALL);
		assert!(SupportedGrants::default().is_empty());
	}
}
