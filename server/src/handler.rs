//! Gateway Handler (C8): the seven-step data-plane pipeline for
//! `POST /anthropic/v1/messages`.

use axum::extract::{FromRequest, Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use tracing::Instrument;

use gateway_types::error::{ClResult, Error};
use gateway_types::ids::new_request_id;

use crate::app::App;

/// Bounds the whole data-plane pipeline — body read, resolve, admission, and
/// upstream forward — at `config.requestTimeoutSeconds` (§6, §7 "Request
/// timeout -> 504"). Applied as a layer ahead of `handle_messages` so it
/// covers the `BoundedBody` extraction too, not just the handler body.
pub async fn request_timeout(State(app): State<App>, req: Request, next: Next) -> Response {
	match tokio::time::timeout(app.config.request_timeout, next.run(req)).await {
		Ok(response) => response,
		Err(_) => Error::Timeout.into_response(),
	}
}

/// Reads the request body up to `config.maxBodyBytes`. A present
/// `Content-Length` already over the limit is rejected without touching the
/// socket; otherwise the streaming read itself is capped (§9 Open Question
/// c: the streaming cap is the only real invariant, the header check is
/// just a fast-reject).
pub struct BoundedBody(pub Bytes);

impl FromRequest<App> for BoundedBody {
	type Rejection = Error;

	async fn from_request(req: Request, state: &App) -> Result<Self, Self::Rejection> {
		let limit = state.config.max_body_bytes;

		if let Some(len) = req
			.headers()
			.get(header::CONTENT_LENGTH)
			.and_then(|v| v.to_str().ok())
			.and_then(|s| s.parse::<usize>().ok())
			&& len > limit
		{
			return Err(Error::BodyTooLarge);
		}

		let collected = Limited::new(req.into_body(), limit)
			.collect()
			.await
			.map_err(|_| Error::BodyTooLarge)?;
		Ok(BoundedBody(collected.to_bytes()))
	}
}

#[derive(Default)]
struct Outcome {
	tenant_id: Option<String>,
	stream: bool,
}

async fn process(app: &App, headers: &HeaderMap, body: Bytes, outcome: &mut Outcome) -> ClResult<Response> {
	let stream = gateway_core::body::detect_stream(&body)?;
	outcome.stream = stream;

	let authorization = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
	let context = app.resolver.resolve(authorization).await?;
	outcome.tenant_id = Some(context.tenant_id.clone());

	if !app.rate_limiter.try_consume(&context) {
		return Err(Error::RateLimited);
	}

	app.upstream_client.forward(body, stream).await
}

/// Assigns a request id, drives the pipeline, and emits one terminal log
/// record carrying `request_id`, `tenant_id` (once resolved), `stream`, and
/// the final status code. The request body is never logged.
pub async fn handle_messages(State(app): State<App>, headers: HeaderMap, BoundedBody(body): BoundedBody) -> Response {
	let request_id = new_request_id();
	let span = tracing::info_span!("gateway_request", request_id = %request_id, tenant_id = tracing::field::Empty);

	async move {
		let mut outcome = Outcome::default();
		let result = process(&app, &headers, body, &mut outcome).await;

		if let Some(tenant_id) = &outcome.tenant_id {
			tracing::Span::current().record("tenant_id", tenant_id.as_str());
		}

		let response = match result {
			Ok(resp) => resp,
			Err(err) => err.into_response(),
		};

		tracing::info!(stream = outcome.stream, status = response.status().as_u16(), "request handled");
		response
	}
	.instrument(span)
	.await
}

// vim: ts=4
