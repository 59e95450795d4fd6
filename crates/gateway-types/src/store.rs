//! The durable `CredentialStore` adapter trait (C2). Concrete backends live
//! in their own crates (see `gateway-store-sqlite`) and are wired in at
//! bootstrap behind this trait object.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::ClResult;
use crate::ids::KeyId;
use crate::model::{
	AdminAuditLogEntry, ClientCredential, QuotaPolicy, Tenant, UpstreamCredential,
};

pub struct CreateClientCredentialOptions<'a> {
	pub tenant_id: &'a str,
	pub user_id: &'a str,
	pub key_prefix: &'a str,
	pub key_hash: &'a str,
	pub scopes: &'a [String],
	pub expires_at: Option<crate::ids::Timestamp>,
}

#[async_trait]
pub trait CredentialStore: Debug + Send + Sync {
	// Data-plane reads (C5)
	async fn find_active_credential_by_key_hash(
		&self,
		key_hash: &str,
	) -> ClResult<Option<ClientCredential>>;
	async fn find_tenant(&self, tenant_id: &str) -> ClResult<Option<Tenant>>;
	async fn find_quota_policy(&self, tenant_id: &str) -> ClResult<Option<QuotaPolicy>>;
	async fn list_active_upstream_credentials(&self) -> ClResult<Vec<UpstreamCredential>>;

	// Admin-plane writes (C9)
	async fn create_tenant(&self, tenant: &Tenant) -> ClResult<Tenant>;
	async fn get_tenant(&self, tenant_id: &str) -> ClResult<Option<Tenant>>;
	async fn create_client_credential(
		&self,
		opts: CreateClientCredentialOptions<'_>,
	) -> ClResult<ClientCredential>;
	async fn list_client_credentials(&self, tenant_id: &str) -> ClResult<Vec<ClientCredential>>;
	async fn revoke_client_credential(&self, key_id: &KeyId) -> ClResult<Option<ClientCredential>>;
	async fn upsert_quota_policy(
		&self,
		tenant_id: &str,
		policy: &QuotaPolicy,
	) -> ClResult<QuotaPolicy>;
	async fn insert_upstream_credential(
		&self,
		record: &UpstreamCredential,
	) -> ClResult<UpstreamCredential>;
	async fn list_upstream_credentials(&self) -> ClResult<Vec<UpstreamCredential>>;
	async fn insert_audit_log_entry(&self, entry: &AdminAuditLogEntry) -> ClResult<()>;
}

// vim: ts=4
