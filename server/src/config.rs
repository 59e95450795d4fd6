//! Configuration (C10): environment-variables-primary, with an optional
//! TOML overlay, loaded once and frozen for the process lifetime.
//!
//! Mirrors the teacher's `AppBuilder`-then-`run()` convention: every field
//! is gathered and validated before `AppState` construction, never lazily
//! re-read afterwards.

use std::path::PathBuf;
use std::time::Duration;

use gateway_types::error::{ClResult, Error};
use gateway_types::model::Plan;

use gateway_core::resolver::StaticTenantEntry;

/// A single `(credential, tenantId, userId, plan)` row from the optional
/// static tenant table, as loaded from the TOML overlay's `[[tenants]]`
/// array (§6 `tenants`).
#[derive(Clone, Debug, serde::Deserialize)]
pub struct TenantTableEntry {
	pub credential: String,
	pub tenant_id: String,
	pub user_id: String,
	pub plan: Plan,
}

/// TOML overlay shape. Every field is optional: anything absent here falls
/// through to the corresponding environment variable or built-in default.
#[derive(Default, Debug, serde::Deserialize)]
struct FileConfig {
	upstream_base_url: Option<String>,
	anthropic_version: Option<String>,
	upstream_api_keys: Option<Vec<String>>,
	default_rpm: Option<u32>,
	#[serde(default)]
	tenants: Vec<TenantTableEntry>,
	use_yaml_fallback: Option<bool>,
	use_database: Option<bool>,
	master_key_path: Option<PathBuf>,
	current_key_version: Option<u32>,
	cache_key_prefix: Option<String>,
	cache_api_key_ttl_seconds: Option<u64>,
	cache_quota_policy_ttl_seconds: Option<u64>,
	admin_api_key_header: Option<String>,
	admin_api_keys: Option<Vec<String>>,
	listen_addr: Option<String>,
	max_body_bytes: Option<usize>,
	request_timeout_seconds: Option<u64>,
	redis_url: Option<String>,
	database_url: Option<String>,
	connect_timeout_ms: Option<u64>,
}

/// The frozen, validated configuration built by [`Config::load`]. Every
/// field named in the option table (§6) is represented here; nothing is
/// re-read from the environment after startup.
#[derive(Debug)]
pub struct Config {
	pub upstream_base_url: String,
	pub anthropic_version: String,
	pub upstream_api_keys: Vec<String>,
	pub default_rpm: u32,
	pub tenants: Vec<TenantTableEntry>,
	pub use_yaml_fallback: bool,
	pub use_database: bool,
	pub master_key_path: PathBuf,
	pub current_key_version: u32,
	pub cache_key_prefix: String,
	pub cache_api_key_ttl: Duration,
	pub cache_quota_policy_ttl: Duration,
	pub admin_api_key_header: String,
	pub admin_api_keys: Vec<String>,
	pub listen_addr: String,
	pub max_body_bytes: usize,
	pub request_timeout: Duration,
	pub redis_url: Option<String>,
	pub database_url: String,
	pub connect_timeout: Duration,
}

fn env_string(key: &str) -> Option<String> {
	std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
	env_string(key).and_then(|s| s.parse().ok())
}

fn env_list(key: &str) -> Option<Vec<String>> {
	env_string(key).map(|s| s.split(',').map(|part| part.trim().to_string()).filter(|p| !p.is_empty()).collect())
}

fn env_bool(key: &str) -> Option<bool> {
	env_string(key).and_then(|s| match s.to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" => Some(false),
		_ => None,
	})
}

impl Config {
	/// Loads the optional TOML overlay named by `GATEWAY_CONFIG_FILE` (if
	/// set), then layers environment variables on top, then applies
	/// built-in defaults, and finally validates the result. Fatal on any
	/// missing required value.
	pub fn load() -> ClResult<Self> {
		let file = match env_string("GATEWAY_CONFIG_FILE") {
			Some(path) => {
				let raw = std::fs::read_to_string(&path)
					.map_err(|e| Error::ConfigError(format!("cannot read config file {path}: {e}")))?;
				toml::from_str::<FileConfig>(&raw)
					.map_err(|e| Error::ConfigError(format!("invalid config file {path}: {e}")))?
			}
			None => FileConfig::default(),
		};

		let upstream_base_url = env_string("GATEWAY_UPSTREAM_BASE_URL")
			.or(file.upstream_base_url)
			.ok_or_else(|| Error::ConfigError("GATEWAY_UPSTREAM_BASE_URL is required".into()))?;

		let admin_api_keys = env_list("GATEWAY_ADMIN_API_KEYS")
			.or(file.admin_api_keys)
			.filter(|v| !v.is_empty())
			.ok_or_else(|| Error::ConfigError("GATEWAY_ADMIN_API_KEYS is required and must be non-empty".into()))?;

		let use_database = env_bool("GATEWAY_USE_DATABASE").or(file.use_database).unwrap_or(true);
		// Required unconditionally: the upstream pool always holds a
		// `Crypto` value to decrypt store-backed upstream credentials, even
		// when the store itself is disabled and happens to return none.
		let master_key_path = env_parsed::<PathBuf>("GATEWAY_MASTER_KEY_PATH")
			.or(file.master_key_path)
			.ok_or_else(|| Error::ConfigError("GATEWAY_MASTER_KEY_PATH is required".into()))?;

		let database_url = env_string("GATEWAY_DATABASE_URL")
			.or(file.database_url)
			.unwrap_or_else(|| "sqlite://gateway.db".to_string());

		let config = Config {
			upstream_base_url,
			anthropic_version: env_string("GATEWAY_ANTHROPIC_VERSION")
				.or(file.anthropic_version)
				.unwrap_or_else(|| "2023-06-01".to_string()),
			upstream_api_keys: env_list("GATEWAY_UPSTREAM_API_KEYS").or(file.upstream_api_keys).unwrap_or_default(),
			default_rpm: env_parsed("GATEWAY_DEFAULT_RPM").or(file.default_rpm).unwrap_or(60),
			tenants: file.tenants,
			use_yaml_fallback: env_bool("GATEWAY_USE_YAML_FALLBACK").or(file.use_yaml_fallback).unwrap_or(false),
			use_database,
			master_key_path,
			current_key_version: env_parsed("GATEWAY_CURRENT_KEY_VERSION").or(file.current_key_version).unwrap_or(1),
			cache_key_prefix: env_string("GATEWAY_CACHE_KEY_PREFIX").or(file.cache_key_prefix).unwrap_or_else(|| "gw:".to_string()),
			cache_api_key_ttl: Duration::from_secs(
				env_parsed("GATEWAY_CACHE_API_KEY_TTL_SECONDS").or(file.cache_api_key_ttl_seconds).unwrap_or(60),
			),
			cache_quota_policy_ttl: Duration::from_secs(
				env_parsed("GATEWAY_CACHE_QUOTA_POLICY_TTL_SECONDS")
					.or(file.cache_quota_policy_ttl_seconds)
					.unwrap_or(60),
			),
			admin_api_key_header: env_string("GATEWAY_ADMIN_API_KEY_HEADER")
				.or(file.admin_api_key_header)
				.unwrap_or_else(|| "X-Admin-Api-Key".to_string()),
			admin_api_keys,
			listen_addr: env_string("GATEWAY_LISTEN_ADDR").or(file.listen_addr).unwrap_or_else(|| "0.0.0.0:8080".to_string()),
			max_body_bytes: env_parsed("GATEWAY_MAX_BODY_BYTES").or(file.max_body_bytes).unwrap_or(10 * 1024 * 1024),
			request_timeout: Duration::from_secs(
				env_parsed("GATEWAY_REQUEST_TIMEOUT_SECONDS").or(file.request_timeout_seconds).unwrap_or(120),
			),
			redis_url: env_string("GATEWAY_REDIS_URL").or(file.redis_url),
			database_url,
			connect_timeout: Duration::from_millis(
				env_parsed("GATEWAY_CONNECT_TIMEOUT_MS").or(file.connect_timeout_ms).unwrap_or(10_000),
			),
		};

		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> ClResult<()> {
		if self.use_yaml_fallback && self.tenants.is_empty() {
			tracing::warn!("auth.useYamlFallback is enabled but no static tenant entries are configured");
		}
		if self.upstream_api_keys.is_empty() && !self.use_database {
			return Err(Error::ConfigError(
				"no upstream credentials available: GATEWAY_UPSTREAM_API_KEYS is empty and GATEWAY_USE_DATABASE is disabled".into(),
			));
		}
		self.listen_addr
			.parse::<std::net::SocketAddr>()
			.map_err(|e| Error::ConfigError(format!("invalid server.listenAddr {:?}: {e}", self.listen_addr)))?;
		Ok(())
	}

	/// One-line startup summary, never including secret material.
	pub fn summary(&self) -> String {
		format!(
			"listen={} upstream={} anthropic_version={} use_database={} use_yaml_fallback={} static_tenants={} admin_keys={} cache={}",
			self.listen_addr,
			self.upstream_base_url,
			self.anthropic_version,
			self.use_database,
			self.use_yaml_fallback,
			self.tenants.len(),
			self.admin_api_keys.len(),
			if self.redis_url.is_some() { "redis" } else { "none" },
		)
	}

	pub fn static_tenant_entries(&self) -> Vec<StaticTenantEntry> {
		self.tenants
			.iter()
			.map(|t| StaticTenantEntry {
				credential: t.credential.clone(),
				tenant_id: t.tenant_id.clone(),
				user_id: t.user_id.clone(),
				plan: t.plan,
			})
			.collect()
	}
}

// vim: ts=4
