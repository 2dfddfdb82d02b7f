//! Current-user profile lookup.

// self
use crate::{
	_prelude::*,
	auth::SessionId,
	error::ConfigError,
	flows::Broker,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind},
	profile::UserProfile,
};

impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Fetches the profile of the user behind `session`.
	///
	/// Calls the descriptor's profile endpoint without parameters and hands the JSON body to the
	/// configured [`ProfileMapper`](crate::profile::ProfileMapper). Every call hits the provider;
	/// nothing is cached.
	pub async fn fetch_user_profile(&self, session: &SessionId) -> Result<UserProfile> {
		obs::observe(FlowKind::UserProfile, "fetch_user_profile", async {
			let unsupported = |missing| ConfigError::ProfileUnsupported {
				descriptor: self.descriptor.id.to_string(),
				missing,
			};
			let endpoint = self
				.descriptor
				.profile_endpoint
				.as_ref()
				.ok_or_else(|| unsupported("profile endpoint"))?;
			let mapper = self.profile_mapper.as_ref().ok_or_else(|| unsupported("profile mapper"))?;
			let payload =
				self.api_request(session, &endpoint.path, endpoint.method, &BTreeMap::new()).await?;

			mapper.map_profile(&payload)
		})
		.await
	}
}
