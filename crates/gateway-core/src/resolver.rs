//! Tenant Resolver (C5): bearer-token -> `TenantContext`.
//!
//! The two sources of truth named in the spec (the static fallback table and
//! the cache-fronted store) are modelled as one `CredentialSource`
//! capability with two implementations, tried in order, rather than
//! scattered `if useYamlFallback` conditionals.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gateway_types::error::{ClResult, Error};
use gateway_types::model::{ClientCredentialInfo, Plan, QuotaPolicy, TenantContext};
use gateway_types::store::CredentialStore;

use crate::cache::{Cache, CacheKeys};
use crate::crypto::Crypto;

/// Returning `Ok(None)` means "no opinion, try the next source". Returning
/// `Err(_)` is a terminal failure: resolution stops and the error is
/// reported as-is. A source that is meant to be authoritative (the store)
/// never returns `Ok(None)`.
#[async_trait]
pub trait CredentialSource: Debug + Send + Sync {
	async fn resolve(&self, credential: &str) -> ClResult<Option<TenantContext>>;
}

#[derive(Clone, Debug)]
pub struct StaticTenantEntry {
	pub credential: String,
	pub tenant_id: String,
	pub user_id: String,
	pub plan: Plan,
}

/// An operator-convenience table that bypasses the store entirely.
#[derive(Debug)]
pub struct StaticCredentialSource {
	by_credential: HashMap<String, StaticTenantEntry>,
	default_rpm: u32,
}

impl StaticCredentialSource {
	pub fn new(entries: Vec<StaticTenantEntry>, default_rpm: u32) -> Self {
		let by_credential =
			entries.into_iter().map(|e| (e.credential.clone(), e)).collect();
		StaticCredentialSource { by_credential, default_rpm }
	}
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
	async fn resolve(&self, credential: &str) -> ClResult<Option<TenantContext>> {
		Ok(self.by_credential.get(credential).map(|entry| TenantContext {
			tenant_id: entry.tenant_id.clone(),
			user_id: entry.user_id.clone(),
			plan: entry.plan,
			quota_policy: QuotaPolicy::default_for(self.default_rpm),
		}))
	}
}

/// The cache-fronted durable-store path (§4.5 steps 3-8).
#[derive(Debug)]
pub struct StoreCredentialSource {
	store: Arc<dyn CredentialStore>,
	cache: Arc<dyn Cache>,
	cache_keys: CacheKeys,
	api_key_ttl: Duration,
	quota_ttl: Duration,
	default_rpm: u32,
}

impl StoreCredentialSource {
	pub fn new(
		store: Arc<dyn CredentialStore>,
		cache: Arc<dyn Cache>,
		cache_keys: CacheKeys,
		api_key_ttl: Duration,
		quota_ttl: Duration,
		default_rpm: u32,
	) -> Self {
		StoreCredentialSource { store, cache, cache_keys, api_key_ttl, quota_ttl, default_rpm }
	}
}

#[async_trait]
impl CredentialSource for StoreCredentialSource {
	async fn resolve(&self, credential: &str) -> ClResult<Option<TenantContext>> {
		let hash = Crypto::hash(credential);

		let info = self.lookup_credential_info(&hash).await?;
		if !info.is_valid() {
			return Err(if info.status == gateway_types::model::CredentialStatus::Revoked {
				Error::Revoked
			} else {
				Error::Expired
			});
		}

		let tenant = self
			.store
			.find_tenant(&info.tenant_id)
			.await?
			.ok_or(Error::TenantMissing)?;

		let policy = self.lookup_quota_policy(&info.tenant_id).await?;

		Ok(Some(TenantContext {
			tenant_id: info.tenant_id,
			user_id: info.user_id,
			plan: tenant.plan,
			quota_policy: policy,
		}))
	}
}

impl StoreCredentialSource {
	async fn lookup_credential_info(&self, hash: &str) -> ClResult<ClientCredentialInfo> {
		let cache_key = self.cache_keys.api_key(hash);

		if let Some(cached) = self.cache.get(&cache_key).await
			&& let Ok(info) = serde_json::from_str::<ClientCredentialInfo>(&cached)
			&& info.is_valid()
		{
			return Ok(info);
		}

		let record = self
			.store
			.find_active_credential_by_key_hash(hash)
			.await?
			.ok_or(Error::UnknownCredential)?;

		let info = ClientCredentialInfo::from(&record);
		if let Ok(serialized) = serde_json::to_string(&info) {
			self.cache.put(&cache_key, &serialized, self.api_key_ttl).await;
		}
		Ok(info)
	}

	async fn lookup_quota_policy(&self, tenant_id: &str) -> ClResult<QuotaPolicy> {
		let cache_key = self.cache_keys.quota(tenant_id);

		if let Some(cached) = self.cache.get(&cache_key).await
			&& let Ok(policy) = serde_json::from_str::<QuotaPolicy>(&cached)
		{
			return Ok(policy);
		}

		match self.store.find_quota_policy(tenant_id).await? {
			Some(policy) => {
				if let Ok(serialized) = serde_json::to_string(&policy) {
					self.cache.put(&cache_key, &serialized, self.quota_ttl).await;
				}
				Ok(policy)
			}
			None => Ok(QuotaPolicy::default_for(self.default_rpm)),
		}
	}
}

pub struct TenantResolver {
	sources: Vec<Arc<dyn CredentialSource>>,
}

impl TenantResolver {
	pub fn new(sources: Vec<Arc<dyn CredentialSource>>) -> Self {
		TenantResolver { sources }
	}

	/// Implements §4.5 step 1 (Bearer-scheme parsing) then delegates to the
	/// configured sources in order.
	pub async fn resolve(&self, authorization_header: Option<&str>) -> ClResult<TenantContext> {
		let header = authorization_header.ok_or(Error::MissingHeader)?;

		let rest = header.strip_prefix("Bearer ").ok_or(Error::InvalidScheme)?;
		let credential = rest.trim();
		if credential.is_empty() {
			return Err(Error::MissingCredential);
		}

		for source in &self.sources {
			if let Some(ctx) = source.resolve(credential).await? {
				return Ok(ctx);
			}
		}

		Err(Error::UnknownCredential)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn missing_header_is_rejected() {
		let resolver = TenantResolver::new(vec![]);
		let err = resolver.resolve(None).await.unwrap_err();
		assert!(matches!(err, Error::MissingHeader));
	}

	#[tokio::test]
	async fn wrong_scheme_is_rejected() {
		let resolver = TenantResolver::new(vec![]);
		let err = resolver.resolve(Some("Basic abc")).await.unwrap_err();
		assert!(matches!(err, Error::InvalidScheme));
	}

	#[tokio::test]
	async fn empty_credential_after_bearer_is_rejected() {
		let resolver = TenantResolver::new(vec![]);
		let err = resolver.resolve(Some("Bearer    ")).await.unwrap_err();
		assert!(matches!(err, Error::MissingCredential));
	}

	#[tokio::test]
	async fn static_fallback_short_circuits_the_store() {
		let source = StaticCredentialSource::new(
			vec![StaticTenantEntry {
				credential: "demo-key".to_string(),
				tenant_id: "demo".to_string(),
				user_id: "u1".to_string(),
				plan: Plan::Basic,
			}],
			60,
		);
		let resolver = TenantResolver::new(vec![Arc::new(source)]);
		let ctx = resolver.resolve(Some("Bearer demo-key")).await.unwrap();
		assert_eq!(ctx.tenant_id, "demo");
	}

	#[tokio::test]
	async fn unknown_credential_with_no_sources_is_rejected() {
		let resolver = TenantResolver::new(vec![]);
		let err = resolver.resolve(Some("Bearer nope")).await.unwrap_err();
		assert!(matches!(err, Error::UnknownCredential));
	}
}

// vim: ts=4
