pub mod auth;
mod handlers;

use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post, put};

use crate::app::App;

pub fn router(app: App) -> Router<App> {
	Router::new()
		.route("/admin/tenants", post(handlers::create_tenant))
		.route("/admin/tenants/{tenant_id}", get(handlers::get_tenant))
		.route("/admin/tenants/{tenant_id}/credentials", post(handlers::create_credential).get(handlers::list_credentials))
		.route("/admin/credentials/{key_id}", delete(handlers::revoke_credential))
		.route("/admin/tenants/{tenant_id}/quota", put(handlers::update_quota))
		.route("/admin/upstream/refresh", post(handlers::refresh_upstream))
		.route("/admin/upstream/status", get(handlers::upstream_status))
		.layer(middleware::from_fn_with_state(app, auth::require_admin_auth))
}

// vim: ts=4
