//! Provider definitions split into data and behavior.
//!
//! [`ProviderDescriptor`] carries everything static about a provider: HTTPS endpoints, the API
//! base, enabled grants, client authentication mode, default scope, and the profile endpoint.
//! [`ProviderStrategy`] holds the few hooks that need code, such as error classification and
//! token request decoration.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
