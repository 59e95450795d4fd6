//! Upstream Client (C7): a single POST to the upstream with auth-header
//! swap, hop-by-hop header stripping, and byte-for-byte streaming or unary
//! response relay.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::Response;
use gateway_types::error::{ClResult, Error};
use http_body_util::Full;
use hyper::Request;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

use crate::upstream_pool::UpstreamPool;

/// Hop-by-hop headers per RFC 7230 §6.1, extended by whatever the upstream
/// additionally names in its own `Connection` header (§9 design note).
const HOP_BY_HOP_HEADERS: &[&str] = &[
	"connection",
	"keep-alive",
	"proxy-authenticate",
	"proxy-authorization",
	"te",
	"trailer",
	"transfer-encoding",
	"upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
	HOP_BY_HOP_HEADERS.iter().any(|h| name.as_str().eq_ignore_ascii_case(h))
}

/// Header names listed inside the upstream's own `Connection` header value
/// must also be stripped, even though they are not in the static hop-by-hop
/// set. (§9 design note, P10)
fn connection_header_names(headers: &HeaderMap) -> Vec<String> {
	headers
		.get_all(header::CONNECTION)
		.iter()
		.filter_map(|v| v.to_str().ok())
		.flat_map(|v| v.split(','))
		.map(|s| s.trim().to_ascii_lowercase())
		.filter(|s| !s.is_empty())
		.collect()
}

fn copy_response_headers(upstream_headers: &HeaderMap) -> HeaderMap {
	let extra_strip = connection_header_names(upstream_headers);
	let mut out = HeaderMap::new();
	for (name, value) in upstream_headers {
		if is_hop_by_hop(name) {
			continue;
		}
		if extra_strip.iter().any(|s| name.as_str().eq_ignore_ascii_case(s)) {
			continue;
		}
		out.append(name.clone(), value.clone());
	}
	out
}

type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;

#[derive(Clone)]
pub struct UpstreamClient {
	base_url: String,
	anthropic_version: String,
	pool: Arc<UpstreamPool>,
	client: Client<HttpsConnector, Full<Bytes>>,
	connect_timeout: Duration,
}

impl UpstreamClient {
	pub fn new(
		base_url: String,
		anthropic_version: String,
		pool: Arc<UpstreamPool>,
		connect_timeout: Duration,
	) -> ClResult<Self> {
		let https = hyper_rustls::HttpsConnectorBuilder::new()
			.with_native_roots()
			.map_err(|e| Error::ConfigError(format!("failed to load native root certificates: {e}")))?
			.https_or_http()
			.enable_http1()
			.build();

		// No keep-alive: the gateway tolerates long-lived, intermittently
		// idle upstream connections rather than reuse a socket that may have
		// gone stale under the upstream's own idle-connection reaping.
		let client = Client::builder(TokioExecutor::new())
			.pool_max_idle_per_host(0)
			.build(https);

		Ok(UpstreamClient {
			base_url: base_url.trim_end_matches('/').to_string(),
			anthropic_version,
			pool,
			client,
			connect_timeout,
		})
	}

	/// Issues the single upstream POST and relays its response. The body is
	/// forwarded byte-for-byte with no parsing or re-serialization. (P9)
	pub async fn forward(&self, body: Bytes, stream: bool) -> ClResult<Response> {
		let api_key = self.pool.next_key()?;
		let accept = if stream { "text/event-stream" } else { "application/json" };

		let uri = format!("{}/v1/messages", self.base_url);
		let request = Request::post(&uri)
			.header("x-api-key", &api_key)
			.header("anthropic-version", &self.anthropic_version)
			.header(header::CONTENT_TYPE, "application/json")
			.header(header::ACCEPT, accept)
			.body(Full::new(body))
			.map_err(|e| Error::UpstreamTransport(format!("failed to build request: {e}")))?;

		let response = tokio::time::timeout(self.connect_timeout, self.client.request(request))
			.await
			.map_err(|_| Error::Timeout)?
			.map_err(|e| Error::UpstreamTransport(e.to_string()))?;

		let status = response.status();
		let mut response_headers = copy_response_headers(response.headers());

		if stream {
			force_streaming_headers(&mut response_headers);
		}

		let mut builder = Response::builder().status(status);
		if let Some(headers) = builder.headers_mut() {
			*headers = response_headers;
		}

		// `axum::body::Body::new` wraps the upstream's `http_body::Body`
		// directly; each frame is relayed to the client as it arrives, so no
		// additional buffering or explicit per-chunk flush is needed here -
		// and dropping this future (client disconnect) cancels the upstream
		// read promptly, since the incoming body stream is simply not polled
		// any further.
		builder
			.body(Body::new(response.into_body()))
			.map_err(|e| Error::UpstreamTransport(format!("failed to build response: {e}")))
	}
}

fn force_streaming_headers(headers: &mut HeaderMap) {
	headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
	headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
	headers.insert(
		HeaderName::from_static("x-accel-buffering"),
		HeaderValue::from_static("no"),
	);
}

/// Builds a pass-through upstream-error response when the transport itself
/// fails before any upstream bytes were received (§7: "Upstream transport
/// failure" -> 502).
pub fn bad_gateway_response() -> Response {
	let mut response = Response::new(Body::empty());
	*response.status_mut() = StatusCode::BAD_GATEWAY;
	response
}


// vim: ts=4
