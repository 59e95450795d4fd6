//! Error handling subsystem. Implements a custom Error type covering the
//! gateway's full taxonomy: tenant resolution failures, admission control,
//! upstream transport, and admin-plane validation.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	// Tenant resolution (C5) - all map to 401, no enumeration signal
	MissingHeader,
	InvalidScheme,
	MissingCredential,
	UnknownCredential,
	Revoked,
	Expired,
	TenantMissing,

	// Admin plane auth
	AdminUnauthorized,

	// Gateway handler body handling
	InvalidJsonBody,
	BodyTooLarge,

	// Admission control (C6)
	RateLimited,

	// Upstream client (C7)
	UpstreamTransport(String),
	Timeout,

	// Admin plane (C9)
	NotFound,
	ValidationError(String),

	// System and configuration
	ConfigError(String),
	CryptoError(String),
	Internal(String),
	DbError,
	Io(std::io::Error),
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{:?}", self)
	}
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
	pub code: String,
	pub message: String,
}

impl ErrorResponse {
	pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { error: ErrorDetails { code: code.into(), message: message.into() } }
	}
}

/// Single generic message for every tenant-resolution failure, so a client
/// cannot distinguish unknown/revoked/expired credentials from one another.
const AUTH_DENIED_MESSAGE: &str = "Authentication required or invalid credential";

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		let (status, code, message) = match self {
			Error::MissingHeader
			| Error::InvalidScheme
			| Error::MissingCredential
			| Error::UnknownCredential
			| Error::Revoked
			| Error::Expired
			| Error::TenantMissing => (
				StatusCode::UNAUTHORIZED,
				"E-AUTH-DENIED".to_string(),
				AUTH_DENIED_MESSAGE.to_string(),
			),
			Error::AdminUnauthorized => (
				StatusCode::UNAUTHORIZED,
				"E-ADMIN-UNAUTH".to_string(),
				"Invalid or missing admin credential".to_string(),
			),
			Error::InvalidJsonBody => (
				StatusCode::BAD_REQUEST,
				"E-BODY-INVALID".to_string(),
				"Invalid JSON body".to_string(),
			),
			Error::BodyTooLarge => (
				StatusCode::PAYLOAD_TOO_LARGE,
				"E-BODY-TOOLARGE".to_string(),
				"Request body exceeds the configured size limit".to_string(),
			),
			Error::RateLimited => (
				StatusCode::TOO_MANY_REQUESTS,
				"E-RATE-LIMITED".to_string(),
				"Rate limit exceeded".to_string(),
			),
			Error::UpstreamTransport(msg) => {
				tracing::warn!(error = %msg, "upstream transport failure");
				(
					StatusCode::BAD_GATEWAY,
					"E-UPSTREAM-TRANSPORT".to_string(),
					"Upstream request failed".to_string(),
				)
			}
			Error::Timeout => (
				StatusCode::GATEWAY_TIMEOUT,
				"E-REQUEST-TIMEOUT".to_string(),
				"Request timed out".to_string(),
			),
			Error::NotFound => (
				StatusCode::NOT_FOUND,
				"E-CORE-NOTFOUND".to_string(),
				"Resource not found".to_string(),
			),
			Error::ValidationError(msg) => (
				StatusCode::BAD_REQUEST,
				"E-VAL-INVALID".to_string(),
				format!("Request validation failed: {msg}"),
			),
			Error::ConfigError(msg) => {
				tracing::error!(error = %msg, "configuration error");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					"E-CONF-CFGERR".to_string(),
					"Internal server error".to_string(),
				)
			}
			Error::CryptoError(msg) => {
				tracing::warn!(error = %msg, "crypto error");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					"E-CRYPT-FAIL".to_string(),
					"Internal server error".to_string(),
				)
			}
			Error::Internal(msg) => {
				tracing::warn!(error = %msg, "internal error");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					"E-CORE-INTERNAL".to_string(),
					"Internal server error".to_string(),
				)
			}
			Error::DbError => (
				StatusCode::INTERNAL_SERVER_ERROR,
				"E-CORE-DBERR".to_string(),
				"Internal server error".to_string(),
			),
			Error::Io(_) => (
				StatusCode::INTERNAL_SERVER_ERROR,
				"E-SYS-IO".to_string(),
				"Internal server error".to_string(),
			),
		};

		let body = ErrorResponse::new(code, message);
		(status, Json(body)).into_response()
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		tracing::warn!("io error: {}", err);
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		tracing::warn!("json error: {}", err);
		Error::InvalidJsonBody
	}
}

impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		tracing::warn!("store error: {}", err);
		Error::DbError
	}
}

impl From<redis::RedisError> for Error {
	fn from(err: redis::RedisError) -> Self {
		tracing::warn!("cache error: {}", err);
		Error::Internal("cache unavailable".into())
	}
}

/// Helper macro for locking mutexes with automatic internal error handling.
#[macro_export]
macro_rules! lock {
	($mutex:expr) => {
		$mutex
			.lock()
			.map_err(|_| $crate::error::Error::Internal("mutex poisoned".into()))
	};
	($mutex:expr, $context:expr) => {
		$mutex
			.lock()
			.map_err(|_| $crate::error::Error::Internal(format!("mutex poisoned: {}", $context)))
	};
}

// vim: ts=4
