//! SQLite-backed implementation of `gateway_types::store::CredentialStore`.
//!
//! Reads used by the data plane (C5) and writes used by the admin plane
//! (C9) share one connection pool. Schema is created idempotently at
//! construction; no external migration runner is required.

use async_trait::async_trait;
use gateway_types::error::{ClResult, Error};
use gateway_types::ids::{KeyId, Timestamp};
use gateway_types::model::{
	AdminAuditLogEntry, ClientCredential, CredentialStatus, Plan, QuotaPolicy, Tenant,
	TenantStatus, UpstreamCredential, UpstreamCredentialStatus,
};
use gateway_types::store::{CreateClientCredentialOptions, CredentialStore};
use gateway_types::prelude::{error, warn};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

mod schema;

pub struct SqliteCredentialStore {
	pool: SqlitePool,
}

impl std::fmt::Debug for SqliteCredentialStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SqliteCredentialStore").finish_non_exhaustive()
	}
}

fn inspect(err: &sqlx::Error) {
	warn!("store: {:#?}", err);
}

fn db_err(err: sqlx::Error) -> Error {
	inspect(&err);
	Error::DbError
}

fn opt_db_err<T>(row: Result<T, sqlx::Error>) -> ClResult<Option<T>> {
	match row {
		Ok(row) => Ok(Some(row)),
		Err(sqlx::Error::RowNotFound) => Ok(None),
		Err(err) => Err(db_err(err)),
	}
}

impl SqliteCredentialStore {
	pub async fn connect(database_url: &str) -> ClResult<Self> {
		// A plain (non-shared-cache) `:memory:` URI gives every physical
		// connection its own private, empty database, so a pool of more than
		// one connection would silently scatter writes and reads across
		// unrelated databases. Cap at one connection in that case; a real,
		// file-backed database keeps the normal pool size.
		let max_connections = if database_url.contains(":memory:") { 1 } else { 10 };
		let pool = SqlitePoolOptions::new()
			.max_connections(max_connections)
			.connect(database_url)
			.await
			.map_err(db_err)?;
		schema::init_db(&pool).await.map_err(db_err)?;
		Ok(SqliteCredentialStore { pool })
	}
}

fn plan_to_str(plan: Plan) -> &'static str {
	match plan {
		Plan::Basic => "basic",
		Plan::Pro => "pro",
		Plan::Enterprise => "enterprise",
	}
}

fn str_to_plan(s: &str) -> ClResult<Plan> {
	match s {
		"basic" => Ok(Plan::Basic),
		"pro" => Ok(Plan::Pro),
		"enterprise" => Ok(Plan::Enterprise),
		other => {
			error!("store: unknown plan {other}");
			Err(Error::DbError)
		}
	}
}

fn tenant_status_to_str(status: TenantStatus) -> &'static str {
	match status {
		TenantStatus::Active => "active",
		TenantStatus::Disabled => "disabled",
	}
}

fn str_to_tenant_status(s: &str) -> ClResult<TenantStatus> {
	match s {
		"active" => Ok(TenantStatus::Active),
		"disabled" => Ok(TenantStatus::Disabled),
		other => {
			error!("store: unknown tenant status {other}");
			Err(Error::DbError)
		}
	}
}

fn credential_status_to_str(status: CredentialStatus) -> &'static str {
	match status {
		CredentialStatus::Active => "active",
		CredentialStatus::Revoked => "revoked",
	}
}

fn str_to_credential_status(s: &str) -> ClResult<CredentialStatus> {
	match s {
		"active" => Ok(CredentialStatus::Active),
		"revoked" => Ok(CredentialStatus::Revoked),
		other => {
			error!("store: unknown credential status {other}");
			Err(Error::DbError)
		}
	}
}

fn upstream_status_to_str(status: UpstreamCredentialStatus) -> &'static str {
	match status {
		UpstreamCredentialStatus::Active => "active",
		UpstreamCredentialStatus::Disabled => "disabled",
	}
}

fn str_to_upstream_status(s: &str) -> ClResult<UpstreamCredentialStatus> {
	match s {
		"active" => Ok(UpstreamCredentialStatus::Active),
		"disabled" => Ok(UpstreamCredentialStatus::Disabled),
		other => {
			error!("store: unknown upstream status {other}");
			Err(Error::DbError)
		}
	}
}

type CredentialRow = (String, String, String, String, String, String, String, Option<i64>);

fn credential_from_row(row: CredentialRow) -> ClResult<ClientCredential> {
	let (key_id, tenant_id, user_id, key_prefix, key_hash, status, scopes, expires_at) = row;
	Ok(ClientCredential {
		key_id: KeyId(key_id),
		tenant_id,
		user_id,
		key_prefix,
		key_hash,
		status: str_to_credential_status(&status)?,
		scopes: serde_json::from_str(&scopes).unwrap_or_default(),
		expires_at: expires_at.map(Timestamp),
	})
}

type UpstreamRow = (String, String, String, i64, Vec<u8>, Vec<u8>, Vec<u8>, Option<Vec<u8>>);

fn upstream_from_row(row: UpstreamRow) -> ClResult<UpstreamCredential> {
	let (upstream_key_id, provider, status, key_version, iv, ciphertext, tag, aad) = row;
	Ok(UpstreamCredential {
		upstream_key_id,
		provider,
		status: str_to_upstream_status(&status)?,
		key_version: key_version as u32,
		iv,
		ciphertext,
		tag,
		aad,
	})
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
	async fn find_active_credential_by_key_hash(
		&self,
		key_hash: &str,
	) -> ClResult<Option<ClientCredential>> {
		let row: Option<CredentialRow> = opt_db_err(
			sqlx::query_as(
				"SELECT key_id, tenant_id, user_id, key_prefix, key_hash, status, scopes, expires_at
				 FROM api_key WHERE key_hash = ? AND status = 'active'",
			)
			.bind(key_hash)
			.fetch_one(&self.pool)
			.await,
		)?;
		row.map(credential_from_row).transpose()
	}

	async fn find_tenant(&self, tenant_id: &str) -> ClResult<Option<Tenant>> {
		self.get_tenant(tenant_id).await
	}

	async fn find_quota_policy(&self, tenant_id: &str) -> ClResult<Option<QuotaPolicy>> {
		type Row = (i64, Option<i64>, Option<i64>, f64);
		let row: Option<Row> = opt_db_err(
			sqlx::query_as(
				"SELECT rpm_limit, tpm_limit, monthly_token_cap, burst_multiplier FROM quota_policy WHERE tenant_id = ?",
			)
			.bind(tenant_id)
			.fetch_one(&self.pool)
			.await,
		)?;

		Ok(row.map(|(rpm_limit, tpm_limit, monthly_token_cap, burst_multiplier)| QuotaPolicy {
			rpm_limit: rpm_limit as u32,
			tpm_limit: tpm_limit.map(|v| v as u32),
			monthly_token_cap: monthly_token_cap.map(|v| v as u64),
			burst_multiplier,
		}))
	}

	async fn list_active_upstream_credentials(&self) -> ClResult<Vec<UpstreamCredential>> {
		let rows: Vec<UpstreamRow> = sqlx::query_as(
			"SELECT upstream_key_id, provider, status, key_version, iv, ciphertext, tag, aad FROM upstream_key_secret WHERE status = 'active'",
		)
		.fetch_all(&self.pool)
		.await
		.map_err(db_err)?;

		rows.into_iter().map(upstream_from_row).collect()
	}

	async fn create_tenant(&self, tenant: &Tenant) -> ClResult<Tenant> {
		sqlx::query(
			"INSERT INTO tenant (tenant_id, name, plan, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
		)
		.bind(&tenant.tenant_id)
		.bind(&tenant.name)
		.bind(plan_to_str(tenant.plan))
		.bind(tenant_status_to_str(tenant.status))
		.bind(tenant.created_at.0)
		.bind(tenant.updated_at.0)
		.execute(&self.pool)
		.await
		.map_err(db_err)?;
		Ok(tenant.clone())
	}

	async fn get_tenant(&self, tenant_id: &str) -> ClResult<Option<Tenant>> {
		type Row = (String, String, String, String, i64, i64);
		let row: Option<Row> = opt_db_err(
			sqlx::query_as(
				"SELECT tenant_id, name, plan, status, created_at, updated_at FROM tenant WHERE tenant_id = ?",
			)
			.bind(tenant_id)
			.fetch_one(&self.pool)
			.await,
		)?;

		row.map(|(tenant_id, name, plan, status, created_at, updated_at)| {
			Ok(Tenant {
				tenant_id,
				name,
				plan: str_to_plan(&plan)?,
				status: str_to_tenant_status(&status)?,
				created_at: Timestamp(created_at),
				updated_at: Timestamp(updated_at),
			})
		})
		.transpose()
	}

	async fn create_client_credential(
		&self,
		opts: CreateClientCredentialOptions<'_>,
	) -> ClResult<ClientCredential> {
		let key_id = gateway_types::ids::new_request_id();
		let scopes_json = serde_json::to_string(opts.scopes).map_err(|_| Error::DbError)?;
		let expires_at = opts.expires_at.map(|t| t.0);
		let status = credential_status_to_str(CredentialStatus::Active);

		sqlx::query(
			"INSERT INTO api_key (key_id, tenant_id, user_id, key_prefix, key_hash, status, scopes, expires_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(&key_id)
		.bind(opts.tenant_id)
		.bind(opts.user_id)
		.bind(opts.key_prefix)
		.bind(opts.key_hash)
		.bind(status)
		.bind(&scopes_json)
		.bind(expires_at)
		.execute(&self.pool)
		.await
		.map_err(db_err)?;

		Ok(ClientCredential {
			key_id: KeyId(key_id),
			tenant_id: opts.tenant_id.to_string(),
			user_id: opts.user_id.to_string(),
			key_prefix: opts.key_prefix.to_string(),
			key_hash: opts.key_hash.to_string(),
			status: CredentialStatus::Active,
			scopes: opts.scopes.to_vec(),
			expires_at: opts.expires_at,
		})
	}

	async fn list_client_credentials(&self, tenant_id: &str) -> ClResult<Vec<ClientCredential>> {
		let rows: Vec<CredentialRow> = sqlx::query_as(
			"SELECT key_id, tenant_id, user_id, key_prefix, key_hash, status, scopes, expires_at FROM api_key WHERE tenant_id = ?",
		)
		.bind(tenant_id)
		.fetch_all(&self.pool)
		.await
		.map_err(db_err)?;

		rows.into_iter().map(credential_from_row).collect()
	}

	async fn revoke_client_credential(&self, key_id: &KeyId) -> ClResult<Option<ClientCredential>> {
		let id = key_id.0.as_str();
		let result = sqlx::query("UPDATE api_key SET status = 'revoked' WHERE key_id = ?")
			.bind(id)
			.execute(&self.pool)
			.await
			.map_err(db_err)?;

		if result.rows_affected() == 0 {
			return Ok(None);
		}

		let row: CredentialRow = sqlx::query_as(
			"SELECT key_id, tenant_id, user_id, key_prefix, key_hash, status, scopes, expires_at FROM api_key WHERE key_id = ?",
		)
		.bind(id)
		.fetch_one(&self.pool)
		.await
		.map_err(db_err)?;

		credential_from_row(row).map(Some)
	}

	async fn upsert_quota_policy(
		&self,
		tenant_id: &str,
		policy: &QuotaPolicy,
	) -> ClResult<QuotaPolicy> {
		let tpm_limit = policy.tpm_limit.map(i64::from);
		let monthly_token_cap = policy.monthly_token_cap.map(|v| v as i64);
		sqlx::query(
			"INSERT INTO quota_policy (tenant_id, rpm_limit, tpm_limit, monthly_token_cap, burst_multiplier)
			 VALUES (?, ?, ?, ?, ?)
			 ON CONFLICT(tenant_id) DO UPDATE SET
			     rpm_limit = excluded.rpm_limit,
			     tpm_limit = excluded.tpm_limit,
			     monthly_token_cap = excluded.monthly_token_cap,
			     burst_multiplier = excluded.burst_multiplier",
		)
		.bind(tenant_id)
		.bind(policy.rpm_limit)
		.bind(tpm_limit)
		.bind(monthly_token_cap)
		.bind(policy.burst_multiplier)
		.execute(&self.pool)
		.await
		.map_err(db_err)?;
		Ok(policy.clone())
	}

	async fn insert_upstream_credential(
		&self,
		record: &UpstreamCredential,
	) -> ClResult<UpstreamCredential> {
		sqlx::query(
			"INSERT INTO upstream_key_secret (upstream_key_id, provider, status, key_version, iv, ciphertext, tag, aad) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(&record.upstream_key_id)
		.bind(&record.provider)
		.bind(upstream_status_to_str(record.status))
		.bind(i64::from(record.key_version))
		.bind(&record.iv)
		.bind(&record.ciphertext)
		.bind(&record.tag)
		.bind(&record.aad)
		.execute(&self.pool)
		.await
		.map_err(db_err)?;
		Ok(record.clone())
	}

	async fn list_upstream_credentials(&self) -> ClResult<Vec<UpstreamCredential>> {
		let rows: Vec<UpstreamRow> = sqlx::query_as(
			"SELECT upstream_key_id, provider, status, key_version, iv, ciphertext, tag, aad FROM upstream_key_secret",
		)
		.fetch_all(&self.pool)
		.await
		.map_err(db_err)?;

		rows.into_iter().map(upstream_from_row).collect()
	}

	async fn insert_audit_log_entry(&self, entry: &AdminAuditLogEntry) -> ClResult<()> {
		let detail_json = entry.detail_json.to_string();
		sqlx::query(
			"INSERT INTO admin_audit_log (actor, action, target_type, target_id, detail_json, client_ip, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(&entry.actor)
		.bind(&entry.action)
		.bind(&entry.target_type)
		.bind(&entry.target_id)
		.bind(&detail_json)
		.bind(&entry.client_ip)
		.bind(entry.created_at.0)
		.execute(&self.pool)
		.await
		.map_err(db_err)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	async fn memory_store() -> SqliteCredentialStore {
		SqliteCredentialStore::connect("sqlite::memory:").await.unwrap()
	}

	#[tokio::test]
	async fn create_and_find_tenant_round_trips() {
		let store = memory_store().await;
		let tenant = Tenant {
			tenant_id: "demo".to_string(),
			name: "Demo Tenant".to_string(),
			plan: Plan::Basic,
			status: TenantStatus::Active,
			created_at: Timestamp(1000),
			updated_at: Timestamp(1000),
		};
		store.create_tenant(&tenant).await.unwrap();
		let found = store.find_tenant("demo").await.unwrap().unwrap();
		assert_eq!(found.tenant_id, "demo");
		assert_eq!(found.plan, Plan::Basic);
	}

	#[tokio::test]
	async fn find_tenant_missing_returns_none() {
		let store = memory_store().await;
		assert!(store.find_tenant("missing").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn revoke_nonexistent_credential_returns_none() {
		let store = memory_store().await;
		let result = store.revoke_client_credential(&KeyId("nope".to_string())).await.unwrap();
		assert!(result.is_none());
	}

	#[tokio::test]
	async fn create_credential_then_find_by_hash_then_revoke() {
		let store = memory_store().await;
		let tenant = Tenant {
			tenant_id: "demo".to_string(),
			name: "Demo".to_string(),
			plan: Plan::Basic,
			status: TenantStatus::Active,
			created_at: Timestamp(1000),
			updated_at: Timestamp(1000),
		};
		store.create_tenant(&tenant).await.unwrap();

		let created = store
			.create_client_credential(CreateClientCredentialOptions {
				tenant_id: "demo",
				user_id: "u1",
				key_prefix: "aic_abc",
				key_hash: "deadbeef",
				scopes: &[],
				expires_at: None,
			})
			.await
			.unwrap();

		let found = store.find_active_credential_by_key_hash("deadbeef").await.unwrap().unwrap();
		assert_eq!(found.key_id, created.key_id);

		let revoked = store.revoke_client_credential(&created.key_id).await.unwrap().unwrap();
		assert_eq!(revoked.status, CredentialStatus::Revoked);

		let after_revoke = store.find_active_credential_by_key_hash("deadbeef").await.unwrap();
		assert!(after_revoke.is_none());
	}

	#[tokio::test]
	async fn quota_policy_upsert_overwrites_existing() {
		let store = memory_store().await;
		let tenant = Tenant {
			tenant_id: "demo".to_string(),
			name: "Demo".to_string(),
			plan: Plan::Basic,
			status: TenantStatus::Active,
			created_at: Timestamp(1000),
			updated_at: Timestamp(1000),
		};
		store.create_tenant(&tenant).await.unwrap();

		store
			.upsert_quota_policy(
				"demo",
				&QuotaPolicy { rpm_limit: 60, tpm_limit: None, monthly_token_cap: None, burst_multiplier: 1.5 },
			)
			.await
			.unwrap();
		store
			.upsert_quota_policy(
				"demo",
				&QuotaPolicy { rpm_limit: 120, tpm_limit: Some(1000), monthly_token_cap: Some(50_000), burst_multiplier: 2.0 },
			)
			.await
			.unwrap();

		let policy = store.find_quota_policy("demo").await.unwrap().unwrap();
		assert_eq!(policy.rpm_limit, 120);
		assert_eq!(policy.tpm_limit, Some(1000));
	}

	#[tokio::test]
	async fn upstream_credentials_round_trip_and_filter_by_status() {
		let store = memory_store().await;
		let active = UpstreamCredential {
			upstream_key_id: "up-1".to_string(),
			provider: "anthropic".to_string(),
			status: UpstreamCredentialStatus::Active,
			key_version: 1,
			iv: vec![1, 2, 3],
			ciphertext: vec![4, 5, 6],
			tag: vec![7, 8, 9],
			aad: None,
		};
		let disabled = UpstreamCredential {
			upstream_key_id: "up-2".to_string(),
			status: UpstreamCredentialStatus::Disabled,
			..active.clone()
		};
		store.insert_upstream_credential(&active).await.unwrap();
		store.insert_upstream_credential(&disabled).await.unwrap();

		assert_eq!(store.list_upstream_credentials().await.unwrap().len(), 2);
		let active_only = store.list_active_upstream_credentials().await.unwrap();
		assert_eq!(active_only.len(), 1);
		assert_eq!(active_only[0].upstream_key_id, "up-1");
	}

	#[tokio::test]
	async fn audit_log_insert_succeeds() {
		let store = memory_store().await;
		store
			.insert_audit_log_entry(&AdminAuditLogEntry {
				actor: "admin".to_string(),
				action: "create_tenant".to_string(),
				target_type: "tenant".to_string(),
				target_id: "demo".to_string(),
				detail_json: serde_json::json!({"name": "Demo"}),
				client_ip: Some("127.0.0.1".to_string()),
				created_at: Timestamp(1000),
			})
			.await
			.unwrap();
	}
}

// vim: ts=4
