//! Admin-plane authentication: a shared-secret header compared against the
//! configured allow-list in constant time, so a timing side channel never
//! reveals how many leading bytes of a guess were correct.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use gateway_core::crypto::Crypto;
use gateway_types::error::Error;

use crate::app::App;

fn constant_time_compare(a: &str, b: &str) -> bool {
	if a.len() != b.len() {
		return false;
	}

	let mut result = 0u8;
	for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
		result |= x ^ y;
	}
	result == 0
}

/// Identity of the authenticated admin caller, recorded in audit log
/// entries. Carries the matched credential itself so write handlers never
/// need a second lookup, but the value is never logged verbatim.
#[derive(Clone, Debug)]
pub struct AdminActor(pub String);

pub async fn require_admin_auth(State(app): State<App>, mut req: Request, next: Next) -> Result<Response, Error> {
	let header_name = &app.config.admin_api_key_header;
	let presented = req
		.headers()
		.get(header_name.as_str())
		.and_then(|v| v.to_str().ok())
		.ok_or(Error::AdminUnauthorized)?;

	if !app.config.admin_api_keys.iter().any(|allowed| constant_time_compare(allowed, presented)) {
		return Err(Error::AdminUnauthorized);
	}

	// The audit log's `actor` column never carries the plaintext admin
	// credential, only a stable hash of it.
	let actor = format!("admin:{}", &Crypto::hash(presented)[..16]);
	req.extensions_mut().insert(AdminActor(actor));
	Ok(next.run(req).await)
}

impl<S> FromRequestParts<S> for AdminActor
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		parts.extensions.get::<AdminActor>().cloned().ok_or(Error::AdminUnauthorized)
	}
}

#[cfg(test)]
mod tests {
	use super::constant_time_compare;

	#[test]
	fn equal_strings_match() {
		assert!(constant_time_compare("secret-key", "secret-key"));
	}

	#[test]
	fn different_strings_do_not_match() {
		assert!(!constant_time_compare("secret-key", "other-key-"));
	}

	#[test]
	fn different_lengths_do_not_match() {
		assert!(!constant_time_compare("short", "a-much-longer-value"));
	}
}

// vim: ts=4
