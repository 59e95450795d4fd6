//! Shared fixtures for the end-to-end scenario tests: a throwaway master
//! key, a fresh in-memory store per test, and a fake upstream that records
//! every request it receives.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use gateway_server::app::AppState;
use gateway_server::config::Config;
use gateway_store_sqlite::SqliteCredentialStore;
use tempfile::TempDir;

pub struct MasterKey {
	pub dir: TempDir,
	pub path: std::path::PathBuf,
}

pub fn write_master_key() -> MasterKey {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("master.key");
	// Fixed bytes suffice here: these tests exercise resolution, admission,
	// and forwarding, never decrypting a real upstream secret.
	let key = [0x5au8; 32];
	std::fs::write(&path, key).unwrap();
	MasterKey { dir, path }
}

pub fn base_config(master_key_path: std::path::PathBuf) -> Config {
	Config {
		upstream_base_url: String::new(),
		anthropic_version: "2023-06-01".to_string(),
		upstream_api_keys: Vec::new(),
		default_rpm: 60,
		tenants: Vec::new(),
		use_yaml_fallback: false,
		use_database: true,
		master_key_path,
		current_key_version: 1,
		cache_key_prefix: "gw-test:".to_string(),
		cache_api_key_ttl: std::time::Duration::from_secs(60),
		cache_quota_policy_ttl: std::time::Duration::from_secs(60),
		admin_api_key_header: "X-Admin-Api-Key".to_string(),
		admin_api_keys: vec!["test-admin-key".to_string()],
		listen_addr: "127.0.0.1:0".to_string(),
		max_body_bytes: 1024 * 1024,
		request_timeout: std::time::Duration::from_secs(5),
		redis_url: None,
		database_url: "sqlite::memory:".to_string(),
		connect_timeout: std::time::Duration::from_secs(5),
	}
}

#[derive(Clone, Default)]
pub struct RecordedRequests(pub Arc<Mutex<Vec<String>>>);

/// A minimal stand-in for the upstream Anthropic API: echoes back a fixed
/// JSON body and records the `x-api-key` header of every call it receives,
/// so tests can assert on round-robin and credential-swap behavior.
pub async fn spawn_fake_upstream() -> (SocketAddr, RecordedRequests) {
	let recorded = RecordedRequests::default();

	async fn handle(State(recorded): State<RecordedRequests>, headers: HeaderMap) -> Json<serde_json::Value> {
		let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
		recorded.0.lock().unwrap().push(api_key);
		Json(serde_json::json!({"id": "msg_test", "type": "message", "content": []}))
	}

	let router = axum::Router::new().route("/v1/messages", post(handle)).with_state(recorded.clone());
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, router).await.unwrap();
	});
	(addr, recorded)
}

pub fn demo_tenant_entry() -> gateway_server::config::TenantTableEntry {
	gateway_server::config::TenantTableEntry {
		credential: "static-demo-key".to_string(),
		tenant_id: "demo".to_string(),
		user_id: "u1".to_string(),
		plan: gateway_types::model::Plan::Basic,
	}
}

pub async fn build_app(config: Config) -> Arc<AppState> {
	let crypto = gateway_core::crypto::Crypto::from_master_key_path(&config.master_key_path, config.current_key_version).unwrap();
	let store: Arc<dyn gateway_types::store::CredentialStore> =
		Arc::new(SqliteCredentialStore::connect(&config.database_url).await.unwrap());
	AppState::build(config, store, crypto).await.unwrap()
}

// vim: ts=4
