#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use oauth2_adapter::{
	_preludet::*,
	auth::{ProviderId, ScopeSet, SessionId, TokenRecord},
	error::ConfigError,
	flows::TokenRequest,
	provider::{ClientAuthMethod, GrantType, ProviderDescriptor},
	store::{MemoryStore, StoreKey, TokenStore},
};

const CLIENT_ID: &str = "client-refresh";
const CLIENT_SECRET: &str = "secret-refresh";
const BASIC_CREDENTIALS: &str = "Basic Y2xpZW50LXJlZnJlc2g6c2VjcmV0LXJlZnJlc2g=";

async fn seed_record(
	store: &MemoryStore,
	descriptor: &ProviderDescriptor,
	session: &SessionId,
	access: &str,
	refresh: Option<&str>,
	expires_in: Duration,
) {
	let issued = OffsetDateTime::now_utc() - Duration::minutes(5);
	let mut builder = TokenRecord::builder(descriptor.id.clone(), session.clone())
		.scope(ScopeSet::new(["user"]).expect("Scope fixture should be valid."))
		.access_token(access)
		.issued_at(issued)
		.expires_at(issued + expires_in);

	if let Some(refresh) = refresh {
		builder = builder.refresh_token(refresh);
	}

	store
		.save(builder.build().expect("Token record fixture should build successfully."))
		.await
		.expect("Failed to seed refresh record into the store.");
}

fn build_descriptor(server: &MockServer) -> ProviderDescriptor {
	let provider_id = ProviderId::new("mock-refresh")
		.expect("Provider identifier should be valid for refresh test.");

	ProviderDescriptor::builder(provider_id)
		.authorization_endpoint(
			Url::parse(&server.url("/oauth/authorize"))
				.expect("Mock authorize endpoint should parse successfully."),
		)
		.token_endpoint(
			Url::parse(&server.url("/oauth/token"))
				.expect("Mock token endpoint should parse successfully."),
		)
		.support_grants([GrantType::AuthorizationCode, GrantType::RefreshToken])
		.preferred_client_auth_method(ClientAuthMethod::ClientSecretBasic)
		.build()
		.expect("Provider descriptor should build successfully.")
}

fn session(value: &str) -> SessionId {
	SessionId::new(value).expect("Session identifier should be valid for refresh test.")
}

#[tokio::test]
async fn refresh_rotates_tokens_and_updates_store() {
	let server = MockServer::start_async().await;
	let descriptor = build_descriptor(&server);
	let (broker, store) = build_reqwest_test_broker(descriptor.clone(), CLIENT_ID, CLIENT_SECRET);
	let session = session("visitor-refresh");

	seed_record(
		&store,
		&descriptor,
		&session,
		"rotating-access",
		Some("rotating-refresh"),
		Duration::minutes(4),
	)
	.await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.header("authorization", BASIC_CREDENTIALS);
			then.status(200)
				.header("content-type", "application/json")
				.body(
					"{\"access_token\":\"access-new\",\"refresh_token\":\"refresh-new\",\"token_type\":\"bearer\",\"expires_in\":1800}",
				);
		})
		.await;
	let record = broker
		.refresh_access_token(TokenRequest::new(session.clone()))
		.await
		.expect("Refresh token rotation should succeed.");

	mock.assert_async().await;

	assert_eq!(record.access_token.expose(), "access-new");
	assert_eq!(record.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh-new"));
	assert_eq!(record.scope.normalized(), "user");

	let stored = store
		.fetch(&StoreKey::new(&descriptor.id, &session))
		.await
		.expect("Token store fetch should succeed.")
		.expect("Record should remain present after refresh.");

	assert_eq!(stored.access_token.expose(), "access-new");
	assert_eq!(stored.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh-new"));
}

#[tokio::test]
async fn refresh_keeps_the_old_refresh_token_when_not_rotated() {
	let server = MockServer::start_async().await;
	let descriptor = build_descriptor(&server);
	let (broker, store) = build_reqwest_test_broker(descriptor.clone(), CLIENT_ID, CLIENT_SECRET);
	let session = session("visitor-sticky");

	seed_record(
		&store,
		&descriptor,
		&session,
		"sticky-access",
		Some("sticky-refresh"),
		Duration::hours(1),
	)
	.await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-only\",\"token_type\":\"bearer\"}");
		})
		.await;
	let record = broker
		.refresh_access_token(TokenRequest::new(session.clone()).force_refresh())
		.await
		.expect("Forced refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(record.access_token.expose(), "access-only");
	assert_eq!(
		record.refresh_token.as_ref().map(|secret| secret.expose()),
		Some("sticky-refresh")
	);
	assert_eq!(record.expires_at, None);
}

#[tokio::test]
async fn fresh_tokens_skip_the_provider() {
	let server = MockServer::start_async().await;
	let descriptor = build_descriptor(&server);
	let (broker, store) = build_reqwest_test_broker(descriptor.clone(), CLIENT_ID, CLIENT_SECRET);
	let session = session("visitor-fresh");

	seed_record(
		&store,
		&descriptor,
		&session,
		"fresh-access",
		Some("fresh-refresh"),
		Duration::hours(2),
	)
	.await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(500);
		})
		.await;
	let record = broker
		.refresh_access_token(TokenRequest::new(session))
		.await
		.expect("Fresh token should be returned as is.");

	assert_eq!(record.access_token.expose(), "fresh-access");

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn refresh_singleflight_hits_provider_once() {
	let server = MockServer::start_async().await;
	let descriptor = build_descriptor(&server);
	let (broker, store) = build_reqwest_test_broker(descriptor.clone(), CLIENT_ID, CLIENT_SECRET);
	let session = session("visitor-singleflight");

	seed_record(
		&store,
		&descriptor,
		&session,
		"access-soon-expiring",
		Some("refresh-soon-expiring"),
		Duration::minutes(4),
	)
	.await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(
					"{\"access_token\":\"access-singleflight\",\"refresh_token\":\"refresh-singleflight\",\"token_type\":\"bearer\",\"expires_in\":3600}",
				);
		})
		.await;
	let request = TokenRequest::new(session).with_preemptive_window(Duration::minutes(5));
	let (first, second): (Result<TokenRecord>, Result<TokenRecord>) = tokio::join!(
		broker.refresh_access_token(request.clone()),
		broker.refresh_access_token(request),
	);
	let first = first.expect("First refresh request should succeed.");
	let second = second.expect("Second refresh request should succeed.");

	assert_eq!(first.access_token.expose(), "access-singleflight");
	assert_eq!(second.access_token.expose(), "access-singleflight");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn refresh_invalid_grant_revokes_record() {
	let server = MockServer::start_async().await;
	let descriptor = build_descriptor(&server);
	let (broker, store) = build_reqwest_test_broker(descriptor.clone(), CLIENT_ID, CLIENT_SECRET);
	let session = session("visitor-revoked");

	seed_record(
		&store,
		&descriptor,
		&session,
		"access-revoke",
		Some("refresh-revoke"),
		Duration::minutes(10),
	)
	.await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\"}");
		})
		.await;
	let err = broker
		.refresh_access_token(TokenRequest::new(session.clone()).force_refresh())
		.await
		.expect_err("Invalid grant errors should surface to the caller.");

	assert!(matches!(err, Error::InvalidGrant { .. }));

	mock.assert_async().await;

	let revoked = store
		.fetch(&StoreKey::new(&descriptor.id, &session))
		.await
		.expect("Token store fetch should succeed for revoked record.")
		.expect("Revoked record should remain present for inspection.");

	assert!(revoked.revoked_at.is_some());

	let err = broker
		.refresh_access_token(TokenRequest::new(session.clone()).force_refresh())
		.await
		.expect_err("Revoked records must not be refreshed again.");

	assert!(matches!(err, Error::Revoked));
	assert!(!broker.is_connected(&session).await.expect("Connection check should succeed."));
}

#[tokio::test]
async fn refresh_requires_a_stored_refresh_token() {
	let server = MockServer::start_async().await;
	let descriptor = build_descriptor(&server);
	let (broker, store) = build_reqwest_test_broker(descriptor.clone(), CLIENT_ID, CLIENT_SECRET);
	let session = session("visitor-no-refresh");
	let err = broker
		.refresh_access_token(TokenRequest::new(session.clone()))
		.await
		.expect_err("Unknown sessions cannot be refreshed.");

	assert!(matches!(err, Error::NotConnected { .. }));

	seed_record(&store, &descriptor, &session, "access-only", None, Duration::minutes(1)).await;

	let err = broker
		.refresh_access_token(TokenRequest::new(session).force_refresh())
		.await
		.expect_err("Records without a refresh token cannot be refreshed.");

	assert!(matches!(err, Error::Config(ConfigError::MissingRefreshToken)));
}
