//! Read-through external cache (C3). A cache failure never fails a request:
//! `get` errors are treated as a miss by the caller, `put` errors are
//! swallowed after a warning log.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Namespaced key helpers, matching §4.3's `"<prefix>apikey:<keyHash>"` and
/// `"<prefix>quota:<tenantId>"` layout.
#[derive(Clone, Debug)]
pub struct CacheKeys {
	pub prefix: String,
}

impl CacheKeys {
	pub fn api_key(&self, key_hash: &str) -> String {
		format!("{}apikey:{}", self.prefix, key_hash)
	}

	pub fn quota(&self, tenant_id: &str) -> String {
		format!("{}quota:{}", self.prefix, tenant_id)
	}
}

#[async_trait]
pub trait Cache: std::fmt::Debug + Send + Sync {
	/// Returns `None` on miss *or* on any cache-layer failure (timeout,
	/// connection error): both are indistinguishable to the caller by
	/// design, since a cache outage must never fail a request.
	async fn get(&self, key: &str) -> Option<String>;

	/// Best-effort write-through. Failures are logged, never propagated.
	async fn put(&self, key: &str, value: &str, ttl: Duration);

	/// Best-effort invalidation. Failures are logged, never propagated.
	async fn delete(&self, key: &str);
}

#[derive(Clone)]
pub struct RedisCache {
	conn: ConnectionManager,
	op_timeout: Duration,
}

impl std::fmt::Debug for RedisCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RedisCache").field("op_timeout", &self.op_timeout).finish()
	}
}

impl RedisCache {
	pub async fn connect(redis_url: &str, op_timeout: Duration) -> gateway_types::error::ClResult<Self> {
		let client = redis::Client::open(redis_url)?;
		let conn = client.get_connection_manager().await?;
		Ok(RedisCache { conn, op_timeout })
	}
}

#[async_trait]
impl Cache for RedisCache {
	async fn get(&self, key: &str) -> Option<String> {
		let mut conn = self.conn.clone();
		let fut = conn.get::<_, Option<String>>(key);
		match tokio::time::timeout(self.op_timeout, fut).await {
			Ok(Ok(value)) => value,
			Ok(Err(e)) => {
				tracing::warn!(error = %e, key, "cache get failed, treating as miss");
				None
			}
			Err(_) => {
				tracing::warn!(key, "cache get timed out, treating as miss");
				None
			}
		}
	}

	async fn put(&self, key: &str, value: &str, ttl: Duration) {
		let mut conn = self.conn.clone();
		let ttl_secs = ttl.as_secs().max(1);
		let fut = conn.set_ex::<_, _, ()>(key, value, ttl_secs);
		match tokio::time::timeout(self.op_timeout, fut).await {
			Ok(Ok(())) => {}
			Ok(Err(e)) => tracing::warn!(error = %e, key, "cache put failed"),
			Err(_) => tracing::warn!(key, "cache put timed out"),
		}
	}

	async fn delete(&self, key: &str) {
		let mut conn = self.conn.clone();
		let fut = conn.del::<_, ()>(key);
		match tokio::time::timeout(self.op_timeout, fut).await {
			Ok(Ok(())) => {}
			Ok(Err(e)) => tracing::warn!(error = %e, key, "cache delete failed"),
			Err(_) => tracing::warn!(key, "cache delete timed out"),
		}
	}
}

/// An in-process cache used by tests and by deployments that opt out of an
/// external cache. Not part of the spec's external-cache requirement for
/// production use, but satisfies the same trait for test wiring.
#[derive(Debug, Default)]
pub struct NullCache;

#[async_trait]
impl Cache for NullCache {
	async fn get(&self, _key: &str) -> Option<String> {
		None
	}

	async fn put(&self, _key: &str, _value: &str, _ttl: Duration) {}

	async fn delete(&self, _key: &str) {}
}


// vim: ts=4
