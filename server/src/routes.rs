//! Router assembly: the data-plane proxy route plus the admin plane,
//! mounted on one shared `AppState`.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::post;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::app::App;
use crate::handler;

pub fn build(app: App) -> Router {
	let data_plane = Router::new()
		.route("/anthropic/v1/messages", post(handler::handle_messages))
		// Body bounding is handled explicitly by `handler::BoundedBody`
		// against `config.maxBodyBytes`; axum's own default limit would
		// just duplicate that check with a generic non-JSON error body.
		.layer(DefaultBodyLimit::disable())
		.layer(middleware::from_fn_with_state(app.clone(), handler::request_timeout));

	Router::new()
		.merge(data_plane)
		.merge(admin::router(app.clone()))
		.layer(TraceLayer::new_for_http())
		.with_state(app)
}

// vim: ts=4
