//! The data model: tenants, client credentials, quota policies, upstream
//! credentials, and the runtime-only `TenantContext`.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::ids::{KeyId, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
	Basic,
	Pro,
	Enterprise,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
	Active,
	Disabled,
}

#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
	pub tenant_id: String,
	pub name: String,
	pub plan: Plan,
	pub status: TenantStatus,
	pub created_at: Timestamp,
	pub updated_at: Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
	Active,
	Revoked,
}

#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCredential {
	pub key_id: KeyId,
	pub tenant_id: String,
	pub user_id: String,
	pub key_prefix: String,
	/// SHA-256 hex digest of the plaintext credential. The plaintext itself
	/// is never persisted and never appears in any serialized form of this
	/// struct.
	pub key_hash: String,
	pub status: CredentialStatus,
	pub scopes: Vec<String>,
	pub expires_at: Option<Timestamp>,
}

impl ClientCredential {
	/// A credential is valid iff active and (no expiry, or not yet expired).
	pub fn is_valid(&self) -> bool {
		self.status == CredentialStatus::Active
			&& self.expires_at.is_none_or(|exp| !exp.is_past())
	}
}

/// A lighter-weight record written through to the cache, carrying only what
/// the resolver needs to re-derive a `TenantContext` without another store
/// round trip.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCredentialInfo {
	pub tenant_id: String,
	pub user_id: String,
	pub status: CredentialStatus,
	pub expires_at: Option<Timestamp>,
}

impl ClientCredentialInfo {
	pub fn is_valid(&self) -> bool {
		self.status == CredentialStatus::Active
			&& self.expires_at.is_none_or(|exp| !exp.is_past())
	}
}

impl From<&ClientCredential> for ClientCredentialInfo {
	fn from(c: &ClientCredential) -> Self {
		ClientCredentialInfo {
			tenant_id: c.tenant_id.clone(),
			user_id: c.user_id.clone(),
			status: c.status,
			expires_at: c.expires_at,
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaPolicy {
	pub rpm_limit: u32,
	pub tpm_limit: Option<u32>,
	pub monthly_token_cap: Option<u64>,
	pub burst_multiplier: f64,
}

impl QuotaPolicy {
	pub fn default_for(default_rpm: u32) -> Self {
		QuotaPolicy {
			rpm_limit: default_rpm.max(1),
			tpm_limit: None,
			monthly_token_cap: None,
			burst_multiplier: 1.5,
		}
	}

	/// `burstCapacity = ceil(rpmLimit * burstMultiplier)`, floored at 1.
	pub fn burst_capacity(&self) -> u32 {
		let raw = (f64::from(self.rpm_limit) * self.burst_multiplier).ceil();
		if raw < 1.0 { 1 } else { raw as u32 }
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamCredentialStatus {
	Active,
	Disabled,
}

/// An AES-256-GCM ciphertext envelope for one upstream provider credential.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamCredential {
	pub upstream_key_id: String,
	pub provider: String,
	pub status: UpstreamCredentialStatus,
	pub key_version: u32,
	pub iv: Vec<u8>,
	pub ciphertext: Vec<u8>,
	pub tag: Vec<u8>,
	pub aad: Option<Vec<u8>>,
}

/// Runtime-only value carried across the request lifetime. Deliberately has
/// no field capable of holding the plaintext bearer credential.
#[derive(Clone, Debug)]
pub struct TenantContext {
	pub tenant_id: String,
	pub user_id: String,
	pub plan: Plan,
	pub quota_policy: QuotaPolicy,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAuditLogEntry {
	pub actor: String,
	pub action: String,
	pub target_type: String,
	pub target_id: String,
	pub detail_json: serde_json::Value,
	pub client_ip: Option<String>,
	pub created_at: Timestamp,
}

// vim: ts=4
