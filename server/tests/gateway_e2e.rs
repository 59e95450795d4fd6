//! End-to-end scenarios (non-streaming happy path, streaming happy path,
//! unknown credential, rate limiting, upstream round-robin, and admin-plane
//! cache invalidation), each driving the assembled router exactly as a
//! real client would.

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
	let response = router.clone().oneshot(request).await.unwrap();
	let status = response.status();
	let bytes = response.into_body().collect().await.unwrap().to_bytes();
	let body = if bytes.is_empty() { serde_json::Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
	(status, body)
}

fn admin_request(method: &str, path: &str, body: serde_json::Value) -> Request<Body> {
	Request::builder()
		.method(method)
		.uri(path)
		.header("content-type", "application/json")
		.header("X-Admin-Api-Key", "test-admin-key")
		.body(Body::from(serde_json::to_vec(&body).unwrap()))
		.unwrap()
}

async fn provision_tenant_and_credential(router: &Router, tenant_id: &str) -> String {
	let (status, _) =
		send(router, admin_request("POST", "/admin/tenants", serde_json::json!({"tenantId": tenant_id, "name": "Demo", "plan": "basic"})))
			.await;
	assert_eq!(status, StatusCode::CREATED);

	let (status, body) = send(
		router,
		admin_request("POST", &format!("/admin/tenants/{tenant_id}/credentials"), serde_json::json!({"userId": "u1"})),
	)
	.await;
	assert_eq!(status, StatusCode::CREATED);
	body["plaintext"].as_str().unwrap().to_string()
}

fn messages_request(credential: &str, body: serde_json::Value) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri("/anthropic/v1/messages")
		.header("content-type", "application/json")
		.header("authorization", format!("Bearer {credential}"))
		.body(Body::from(serde_json::to_vec(&body).unwrap()))
		.unwrap()
}

#[tokio::test]
async fn non_streaming_happy_path() {
	let master_key = common::write_master_key();
	let (upstream_addr, _recorded) = common::spawn_fake_upstream().await;

	let mut config = common::base_config(master_key.path.clone());
	config.upstream_base_url = format!("http://{upstream_addr}");
	let app = common::build_app(config).await;
	let router = gateway_server::routes::build(app);

	let credential = provision_tenant_and_credential(&router, "demo").await;

	let (status, body) = send(&router, messages_request(&credential, serde_json::json!({"model": "claude", "messages": []}))).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["id"], "msg_test");
}

#[tokio::test]
async fn streaming_happy_path() {
	let master_key = common::write_master_key();
	let (upstream_addr, _recorded) = common::spawn_fake_upstream().await;

	let mut config = common::base_config(master_key.path.clone());
	config.upstream_base_url = format!("http://{upstream_addr}");
	let app = common::build_app(config).await;
	let router = gateway_server::routes::build(app);

	let credential = provision_tenant_and_credential(&router, "demo").await;

	let request = messages_request(&credential, serde_json::json!({"model": "claude", "messages": [], "stream": true}));
	let response = router.clone().oneshot(request).await.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(response.headers().get("content-type").unwrap(), "text/event-stream");
}

#[tokio::test]
async fn unknown_credential_is_rejected() {
	let master_key = common::write_master_key();
	let mut config = common::base_config(master_key.path.clone());
	config.upstream_base_url = "http://127.0.0.1:1".to_string();
	let app = common::build_app(config).await;
	let router = gateway_server::routes::build(app);

	let (status, _) = send(&router, messages_request("not-a-real-credential", serde_json::json!({"model": "claude"}))).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rate_limit_rejects_second_request() {
	let master_key = common::write_master_key();
	let (upstream_addr, _recorded) = common::spawn_fake_upstream().await;

	let mut config = common::base_config(master_key.path.clone());
	config.upstream_base_url = format!("http://{upstream_addr}");
	let app = common::build_app(config).await;
	let router = gateway_server::routes::build(app);

	let credential = provision_tenant_and_credential(&router, "demo").await;

	let (status, quota_body) = send(
		&router,
		admin_request(
			"PUT",
			"/admin/tenants/demo/quota",
			serde_json::json!({"rpmLimit": 1, "tpmLimit": null, "monthlyTokenCap": null, "burstMultiplier": 1.0}),
		),
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(quota_body["rpmLimit"], 1);

	let (first, _) = send(&router, messages_request(&credential, serde_json::json!({"model": "claude"}))).await;
	assert_eq!(first, StatusCode::OK);

	let (second, _) = send(&router, messages_request(&credential, serde_json::json!({"model": "claude"}))).await;
	assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn upstream_credentials_round_robin_across_requests() {
	let master_key = common::write_master_key();
	let (upstream_addr, recorded) = common::spawn_fake_upstream().await;

	let mut config = common::base_config(master_key.path.clone());
	config.upstream_base_url = format!("http://{upstream_addr}");
	config.use_database = false;
	config.use_yaml_fallback = true;
	config.upstream_api_keys = vec!["sk-up-1".to_string(), "sk-up-2".to_string()];
	config.tenants = vec![common::demo_tenant_entry()];
	let app = common::build_app(config).await;
	let router = gateway_server::routes::build(app);

	for _ in 0..4 {
		let (status, _) = send(&router, messages_request("static-demo-key", serde_json::json!({"model": "claude"}))).await;
		assert_eq!(status, StatusCode::OK);
	}

	let seen = recorded.0.lock().unwrap().clone();
	assert_eq!(seen, vec!["sk-up-1", "sk-up-2", "sk-up-1", "sk-up-2"]);
}

#[tokio::test]
async fn revoking_a_credential_invalidates_the_cache_synchronously() {
	let master_key = common::write_master_key();
	let (upstream_addr, _recorded) = common::spawn_fake_upstream().await;

	let mut config = common::base_config(master_key.path.clone());
	config.upstream_base_url = format!("http://{upstream_addr}");
	let app = common::build_app(config).await;
	let router = gateway_server::routes::build(app);

	let credential = provision_tenant_and_credential(&router, "demo").await;

	let (status, _) = send(&router, messages_request(&credential, serde_json::json!({"model": "claude"}))).await;
	assert_eq!(status, StatusCode::OK);

	let (status, credentials) = send(&router, admin_request("GET", "/admin/tenants/demo/credentials", serde_json::Value::Null)).await;
	assert_eq!(status, StatusCode::OK);
	let key_id = credentials[0]["keyId"].as_str().unwrap().to_string();

	let (status, _) = send(&router, admin_request("DELETE", &format!("/admin/credentials/{key_id}"), serde_json::Value::Null)).await;
	assert_eq!(status, StatusCode::OK);

	let (status, _) = send(&router, messages_request(&credential, serde_json::json!({"model": "claude"}))).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED, "revoked credential must be rejected immediately, not after the cache TTL expires");
}

// vim: ts=4
