//! Application state (C12 step 6): wires crypto, store, cache, upstream
//! pool, rate limiter, tenant resolver, and upstream client into one
//! `Arc<AppState>` shared across every handler.

use std::sync::Arc;

use gateway_core::cache::{Cache, CacheKeys, NullCache, RedisCache};
use gateway_core::crypto::Crypto;
use gateway_core::rate_limiter::RateLimiter;
use gateway_core::resolver::{CredentialSource, StaticCredentialSource, StoreCredentialSource, TenantResolver};
use gateway_core::upstream_client::UpstreamClient;
use gateway_core::upstream_pool::UpstreamPool;
use gateway_types::error::ClResult;
use gateway_types::store::CredentialStore;

use crate::config::Config;

pub struct AppState {
	pub config: Config,
	pub store: Arc<dyn CredentialStore>,
	pub cache: Arc<dyn Cache>,
	pub cache_keys: CacheKeys,
	pub crypto: Crypto,
	pub upstream_pool: Arc<UpstreamPool>,
	pub upstream_client: UpstreamClient,
	pub rate_limiter: RateLimiter,
	pub resolver: TenantResolver,
}

pub type App = Arc<AppState>;

impl AppState {
	/// Assembles every C1-C7 component from a validated [`Config`]. Does not
	/// bind a listener or mount routes; see `bootstrap::bootstrap`.
	pub async fn build(config: Config, store: Arc<dyn CredentialStore>, crypto: Crypto) -> ClResult<Arc<Self>> {
		let cache: Arc<dyn Cache> = match &config.redis_url {
			Some(url) => Arc::new(RedisCache::connect(url, config.connect_timeout).await?),
			None => Arc::new(NullCache),
		};
		let cache_keys = CacheKeys { prefix: config.cache_key_prefix.clone() };

		let upstream_pool =
			Arc::new(UpstreamPool::bootstrap(store.clone(), crypto.clone(), config.upstream_api_keys.clone()).await?);

		let upstream_client = UpstreamClient::new(
			config.upstream_base_url.clone(),
			config.anthropic_version.clone(),
			upstream_pool.clone(),
			config.connect_timeout,
		)?;

		let mut sources: Vec<Arc<dyn CredentialSource>> = Vec::new();
		if config.use_yaml_fallback {
			sources.push(Arc::new(StaticCredentialSource::new(config.static_tenant_entries(), config.default_rpm)));
		}
		if config.use_database {
			sources.push(Arc::new(StoreCredentialSource::new(
				store.clone(),
				cache.clone(),
				cache_keys.clone(),
				config.cache_api_key_ttl,
				config.cache_quota_policy_ttl,
				config.default_rpm,
			)));
		}
		let resolver = TenantResolver::new(sources);

		Ok(Arc::new(AppState {
			config,
			store,
			cache,
			cache_keys,
			crypto,
			upstream_pool,
			upstream_client,
			rate_limiter: RateLimiter::new(),
			resolver,
		}))
	}
}

// vim: ts=4
