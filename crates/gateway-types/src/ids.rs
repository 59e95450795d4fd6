//! Newtypes for identifiers and timestamps used across the data model.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Opaque tenant identifier, 3-64 chars, `[A-Za-z0-9_-]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
	/// Validates the `tenantId` charset/length invariant from the data model.
	pub fn is_valid(s: &str) -> bool {
		(3..=64).contains(&s.len())
			&& s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
	}
}

impl std::fmt::Display for TenantId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl AsRef<str> for TenantId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

/// Gateway-issued client credential identifier (primary key of `api_key`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(pub String);

impl std::fmt::Display for KeyId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Seconds since the Unix epoch. Serializes as a bare integer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Timestamp {
		let d = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
		Timestamp(d.as_secs() as i64)
	}

	pub fn from_now(delta_secs: i64) -> Timestamp {
		Timestamp(Timestamp::now().0 + delta_secs)
	}

	pub fn is_past(&self) -> bool {
		self.0 <= Timestamp::now().0
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Serialize for Timestamp {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_i64(self.0)
	}
}

impl<'de> Deserialize<'de> for Timestamp {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(Timestamp(i64::deserialize(deserializer)?))
	}
}

/// Random UUID-like identifier assigned to every data-plane request.
pub fn new_request_id() -> String {
	uuid::Uuid::new_v4().to_string()
}

// vim: ts=4
