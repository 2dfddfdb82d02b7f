//! Signs a user in with ANTCloud staging and prints their profile.
//!
//! ```sh
//! ANTCLOUD_CLIENT_ID=... ANTCLOUD_CLIENT_SECRET=... \
//! ANTCLOUD_CALLBACK=https://app.example.com/callback \
//! 	cargo run --example antcloud_authorization
//! ```
//!
//! Open the printed URL, approve access, then paste the full URL the browser was redirected to.

// std
use std::{env, io, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::WrapErr};
use url::Url;
// self
use oauth2_adapter::{
	auth::SessionId,
	config::{AdapterConfig, ClientKeys},
	providers::antcloud,
	store::{MemoryStore, TokenStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = AdapterConfig::new(
		Url::parse(&env::var("ANTCLOUD_CALLBACK").wrap_err("ANTCLOUD_CALLBACK is not set")?)?,
		ClientKeys::new(
			env::var("ANTCLOUD_CLIENT_ID").wrap_err("ANTCLOUD_CLIENT_ID is not set")?,
			env::var("ANTCLOUD_CLIENT_SECRET").wrap_err("ANTCLOUD_CLIENT_SECRET is not set")?,
		),
	);
	let store: Arc<dyn TokenStore> = Arc::new(MemoryStore::default());
	let broker = antcloud::broker(&config, store)?;
	let session = SessionId::new("demo-visitor")?;
	let authorization = broker.start_authorization(session.clone())?;

	println!("Open this URL in a browser:\n\n\t{}\n", authorization.authorize_url);
	println!("Paste the URL you were redirected to:");

	let mut line = String::new();

	io::stdin().read_line(&mut line)?;

	let redirect = Url::parse(line.trim()).wrap_err("Redirect URL does not parse")?;
	let record = broker.complete_authorization_from_redirect(authorization, &redirect).await?;

	println!("Connected; token expires at {:?}.", record.expires_at);

	let profile = broker.fetch_user_profile(&session).await?;

	println!("Identifier: {}", profile.identifier);
	println!("Name: {}", profile.display_name.as_deref().unwrap_or("(none)"));
	println!("Email: {}", profile.email.as_deref().unwrap_or("(none)"));

	broker.disconnect(&session).await?;

	Ok(())
}
