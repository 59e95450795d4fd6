//! Admin Interface (C9): tenant/credential/quota CRUD, upstream pool
//! control, and the audit log. Every mutating handler writes one audit log
//! row and performs its cache/pool side effects *before* returning 200/201,
//! so a successful response always means the side effect already took
//! effect.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use gateway_core::crypto::Crypto;
use gateway_types::error::{ClResult, Error};
use gateway_types::ids::{KeyId, Timestamp};
use gateway_types::model::{AdminAuditLogEntry, ClientCredential, Plan, QuotaPolicy, Tenant, TenantStatus};
use gateway_types::store::CreateClientCredentialOptions;

use crate::admin::auth::AdminActor;
use crate::app::App;
use crate::bootstrap;

async fn audit(app: &App, actor: &AdminActor, action: &str, target_type: &str, target_id: &str, detail: serde_json::Value) {
	let entry = AdminAuditLogEntry {
		actor: actor.0.clone(),
		action: action.to_string(),
		target_type: target_type.to_string(),
		target_id: target_id.to_string(),
		detail_json: detail,
		client_ip: None,
		created_at: Timestamp::now(),
	};
	if let Err(e) = app.store.insert_audit_log_entry(&entry).await {
		tracing::warn!(error = %e, action, target_type, target_id, "failed to write admin audit log entry");
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantRequest {
	pub tenant_id: String,
	pub name: String,
	pub plan: Plan,
}

pub async fn create_tenant(
	State(app): State<App>,
	actor: AdminActor,
	Json(req): Json<CreateTenantRequest>,
) -> ClResult<impl IntoResponse> {
	if !gateway_types::ids::TenantId::is_valid(&req.tenant_id) {
		return Err(Error::ValidationError("tenantId must be 3-64 chars of [A-Za-z0-9_-]".into()));
	}

	let now = Timestamp::now();
	let tenant = Tenant {
		tenant_id: req.tenant_id.clone(),
		name: req.name,
		plan: req.plan,
		status: TenantStatus::Active,
		created_at: now,
		updated_at: now,
	};
	let created = app.store.create_tenant(&tenant).await?;
	audit(&app, &actor, "create_tenant", "tenant", &req.tenant_id, serde_json::json!({"plan": req.plan})).await;
	Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_tenant(State(app): State<App>, Path(tenant_id): Path<String>) -> ClResult<impl IntoResponse> {
	match app.store.get_tenant(&tenant_id).await? {
		Some(tenant) => Ok((StatusCode::OK, Json(tenant))),
		None => Err(Error::NotFound),
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCredentialRequest {
	pub user_id: String,
	#[serde(default)]
	pub scopes: Vec<String>,
	pub expires_at: Option<Timestamp>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCredentialResponse {
	pub key_id: KeyId,
	pub plaintext: String,
	pub prefix: String,
}

pub async fn create_credential(
	State(app): State<App>,
	actor: AdminActor,
	Path(tenant_id): Path<String>,
	Json(req): Json<CreateCredentialRequest>,
) -> ClResult<impl IntoResponse> {
	if app.store.get_tenant(&tenant_id).await?.is_none() {
		return Err(Error::NotFound);
	}

	let (plaintext, prefix, key_hash) = Crypto::generate_client_credential();
	let credential = app
		.store
		.create_client_credential(CreateClientCredentialOptions {
			tenant_id: &tenant_id,
			user_id: &req.user_id,
			key_prefix: &prefix,
			key_hash: &key_hash,
			scopes: &req.scopes,
			expires_at: req.expires_at,
		})
		.await?;

	audit(
		&app,
		&actor,
		"create_client_credential",
		"client_credential",
		&credential.key_id.0,
		serde_json::json!({"tenantId": tenant_id, "userId": req.user_id}),
	)
	.await;

	Ok((
		StatusCode::CREATED,
		Json(CreateCredentialResponse { key_id: credential.key_id, plaintext, prefix }),
	))
}

pub async fn list_credentials(
	State(app): State<App>,
	Path(tenant_id): Path<String>,
) -> ClResult<Json<Vec<ClientCredential>>> {
	Ok(Json(app.store.list_client_credentials(&tenant_id).await?))
}

pub async fn revoke_credential(
	State(app): State<App>,
	actor: AdminActor,
	Path(key_id): Path<String>,
) -> ClResult<impl IntoResponse> {
	let key_id = KeyId(key_id);
	match app.store.revoke_client_credential(&key_id).await? {
		Some(credential) => {
			app.cache.delete(&app.cache_keys.api_key(&credential.key_hash)).await;
			audit(&app, &actor, "revoke_client_credential", "client_credential", &key_id.0, serde_json::json!({})).await;
			Ok((StatusCode::OK, Json(credential)))
		}
		None => Err(Error::NotFound),
	}
}

pub async fn update_quota(
	State(app): State<App>,
	actor: AdminActor,
	Path(tenant_id): Path<String>,
	Json(policy): Json<QuotaPolicy>,
) -> ClResult<impl IntoResponse> {
	if policy.rpm_limit < 1 {
		return Err(Error::ValidationError("rpmLimit must be >= 1".into()));
	}
	if policy.tpm_limit.is_some_and(|tpm| tpm < 1) {
		return Err(Error::ValidationError("tpmLimit must be >= 1 when present".into()));
	}
	if !(1.0..=10.0).contains(&policy.burst_multiplier) {
		return Err(Error::ValidationError("burstMultiplier must be within [1.0, 10.0]".into()));
	}
	let updated = app.store.upsert_quota_policy(&tenant_id, &policy).await?;
	app.cache.delete(&app.cache_keys.quota(&tenant_id)).await;
	audit(&app, &actor, "update_quota_policy", "tenant", &tenant_id, serde_json::to_value(&updated).unwrap_or_default()).await;
	Ok((StatusCode::OK, Json(updated)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshUpstreamResponse {
	pub key_count: usize,
}

pub async fn refresh_upstream(State(app): State<App>, actor: AdminActor) -> ClResult<impl IntoResponse> {
	let key_count = bootstrap::refresh_upstream_pool(&app).await?;
	audit(&app, &actor, "refresh_upstream_pool", "upstream_pool", "-", serde_json::json!({"keyCount": key_count})).await;
	Ok((StatusCode::OK, Json(RefreshUpstreamResponse { key_count })))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamCredentialStatusView {
	pub upstream_key_id: String,
	pub provider: String,
	pub status: gateway_types::model::UpstreamCredentialStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamStatusResponse {
	pub pool_size: usize,
	pub credentials: Vec<UpstreamCredentialStatusView>,
}

pub async fn upstream_status(State(app): State<App>) -> ClResult<Json<UpstreamStatusResponse>> {
	let credentials = app
		.store
		.list_upstream_credentials()
		.await?
		.into_iter()
		.map(|c| UpstreamCredentialStatusView { upstream_key_id: c.upstream_key_id, provider: c.provider, status: c.status })
		.collect();

	Ok(Json(UpstreamStatusResponse { pool_size: app.upstream_pool.len(), credentials }))
}

// vim: ts=4
