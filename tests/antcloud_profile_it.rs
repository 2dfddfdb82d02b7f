// self
use oauth2_adapter::{
	_preludet::*,
	auth::{SessionId, TokenRecord},
	config::{AdapterConfig, ClientKeys},
	error::ConfigError,
	flows::TokenRequest,
	oauth::BasicTransportErrorMapper,
	profile::UserProfile,
	providers::antcloud,
	store::MemoryStore,
};

const CURRENT_USER_URL: &str = "https://api.staging.antinodehq.com/user-service/currentUser";
const TOKEN_URL: &str = "https://auth.staging.antinodehq.com/oauth/token";
const TOKEN_BODY: &str = "{\"access_token\":\"access-ant\",\"refresh_token\":\"refresh-ant\",\"token_type\":\"bearer\",\"expires_in\":3600}";

fn config() -> AdapterConfig {
	AdapterConfig::new(
		Url::parse("https://app.example.com/hybridauth/callback")
			.expect("Callback URL should parse successfully."),
		ClientKeys::new("abc", "xyz"),
	)
}

fn build_broker(config: &AdapterConfig) -> (ScriptedBroker, ScriptedHttpClient) {
	let http_client = ScriptedHttpClient::default();
	let broker = antcloud::broker_with_http_client(
		config,
		Arc::new(MemoryStore::default()),
		http_client.clone(),
		BasicTransportErrorMapper,
	)
	.expect("ANTCloud broker should build from a valid config.");

	(broker, http_client)
}

fn session() -> SessionId {
	SessionId::new("visitor-ant").expect("Session identifier should be valid for ANTCloud test.")
}

async fn connect(broker: &ScriptedBroker) {
	let record = TokenRecord::builder(broker.descriptor.id.clone(), session())
		.access_token("access-ant")
		.expires_in(Duration::hours(1))
		.build()
		.expect("Token record fixture should build successfully.");

	broker.store_access_token(record).await.expect("Seeding the token should succeed.");
}

fn form(body: &str) -> HashMap<String, String> {
	oauth2_adapter::url::form_urlencoded::parse(body.as_bytes()).into_owned().collect()
}

#[tokio::test]
async fn profile_is_read_from_current_user() {
	let (broker, http_client) = build_broker(&config());

	connect(&broker).await;
	http_client.respond(200, "{\"id\":\"42\",\"name\":\"Ann\",\"email\":\"ann@x.com\"}");

	let profile =
		broker.fetch_user_profile(&session()).await.expect("Profile fetch should succeed.");

	assert_eq!(
		profile,
		UserProfile {
			identifier: "42".into(),
			display_name: Some("Ann".into()),
			email: Some("ann@x.com".into()),
		}
	);

	let requests = http_client.requests();

	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].method, "POST");
	assert_eq!(requests[0].url, CURRENT_USER_URL);
	assert_eq!(requests[0].header("authorization"), Some("Bearer access-ant"));
	assert_eq!(requests[0].body, "");
}

#[tokio::test]
async fn profile_without_id_is_rejected() {
	let (broker, http_client) = build_broker(&config());

	connect(&broker).await;
	http_client.respond(200, "{\"name\":\"Ann\"}");

	let err = broker
		.fetch_user_profile(&session())
		.await
		.expect_err("A payload without an id must be rejected.");

	assert!(matches!(err, Error::UnexpectedApiResponse { .. }));
	assert!(err.to_string().starts_with("Unexpected API response"), "{err}");
}

#[tokio::test]
async fn profile_requires_a_connection_and_surfaces_api_errors() {
	let (broker, http_client) = build_broker(&config());
	let err = broker
		.fetch_user_profile(&session())
		.await
		.expect_err("Profiles need a stored token.");

	assert!(matches!(err, Error::NotConnected { .. }));
	assert!(http_client.requests().is_empty());

	connect(&broker).await;
	http_client.respond(401, "{\"message\":\"token expired\"}");

	let err = broker
		.fetch_user_profile(&session())
		.await
		.expect_err("Provider errors should surface.");

	assert!(matches!(err, Error::ApiStatus { status: 401, .. }));

	http_client.respond(200, "not json");

	let err = broker
		.fetch_user_profile(&session())
		.await
		.expect_err("Non-JSON payloads should be rejected.");

	assert!(matches!(err, Error::UnexpectedApiResponse { .. }));
}

#[tokio::test]
async fn token_requests_use_basic_credentials() {
	let (broker, http_client) = build_broker(&config());
	let authorization =
		broker.start_authorization(session()).expect("Authorization should start successfully.");

	assert!(authorization.authorize_url.as_str().starts_with(antcloud::AUTHORIZE_URL));
	assert!(authorization.authorize_url.query_pairs().any(|(k, v)| k == "scope" && v == "user"));

	let mut redirect = config().callback;

	redirect
		.query_pairs_mut()
		.append_pair("code", "code-ant")
		.append_pair("state", &authorization.state);
	http_client.respond(200, TOKEN_BODY);

	let record = broker
		.complete_authorization_from_redirect(authorization, &redirect)
		.await
		.expect("Code exchange should succeed.");

	assert_eq!(record.access_token.expose(), "access-ant");

	http_client.respond(
		200,
		"{\"access_token\":\"access-ant-2\",\"refresh_token\":\"refresh-ant-2\",\"token_type\":\"bearer\",\"expires_in\":3600}",
	);

	let refreshed = broker
		.refresh_access_token(TokenRequest::new(session()).force_refresh())
		.await
		.expect("Refresh should succeed.");

	assert_eq!(refreshed.access_token.expose(), "access-ant-2");

	let requests = http_client.requests();

	assert_eq!(requests.len(), 2);

	for request in &requests {
		assert_eq!(request.method, "POST");
		assert_eq!(request.url, TOKEN_URL);
		assert_eq!(request.header("authorization"), Some("Basic YWJjOnh5eg=="));
		assert!(!form(&request.body).contains_key("client_secret"));
	}

	let exchange = form(&requests[0].body);

	assert_eq!(exchange.get("grant_type").map(String::as_str), Some("authorization_code"));
	assert_eq!(exchange.get("code").map(String::as_str), Some("code-ant"));
	assert_eq!(
		exchange.get("redirect_uri").map(String::as_str),
		Some("https://app.example.com/hybridauth/callback")
	);
	assert!(exchange.contains_key("code_verifier"));

	let refresh = form(&requests[1].body);

	assert_eq!(refresh.get("grant_type").map(String::as_str), Some("refresh_token"));
	assert_eq!(refresh.get("refresh_token").map(String::as_str), Some("refresh-ant"));
}

#[tokio::test]
async fn configured_scope_overrides_the_default() {
	let (broker, _http_client) = build_broker(&config().with_scope("user,email"));
	let authorization =
		broker.start_authorization(session()).expect("Authorization should start successfully.");

	assert!(
		authorization
			.authorize_url
			.query_pairs()
			.any(|(k, v)| k == "scope" && v == "email user")
	);

	let blank = AdapterConfig::new(config().callback, ClientKeys::new(" ", "xyz"));
	let err: Result<ScriptedBroker> = antcloud::broker_with_http_client(
		&blank,
		Arc::new(MemoryStore::default()),
		ScriptedHttpClient::default(),
		BasicTransportErrorMapper,
	);

	assert!(matches!(err, Err(Error::Config(ConfigError::InvalidConfig { .. }))));
}
