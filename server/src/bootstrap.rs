//! Bootstrap (C12): the fail-fast startup sequence. Each step logs a
//! `FATAL:`-prefixed error and aborts before any listener is bound, mirroring
//! the teacher's bootstrap convention.

use std::sync::Arc;

use gateway_core::crypto::Crypto;
use gateway_store_sqlite::SqliteCredentialStore;
use gateway_types::error::ClResult;

use crate::app::AppState;
use crate::config::Config;
use crate::prelude::*;

/// Scans `path`'s parent directory for siblings named `<file_name>.v<n>`
/// and returns the set of `n` found, for loading key versions that predate
/// a rotation (§4.12 step 2).
fn discover_additional_key_versions(path: &std::path::Path) -> Vec<u32> {
	let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
		return Vec::new();
	};
	let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
	let Ok(entries) = std::fs::read_dir(dir) else {
		return Vec::new();
	};

	let prefix = format!("{file_name}.v");
	let mut versions: Vec<u32> = entries
		.filter_map(Result::ok)
		.filter_map(|entry| entry.file_name().into_string().ok())
		.filter_map(|name| name.strip_prefix(&prefix).and_then(|suffix| suffix.parse().ok()))
		.collect();
	versions.sort_unstable();
	versions
}

/// Runs the full C12 sequence and returns a fully wired `AppState`, ready
/// to have routes mounted and a listener bound.
pub async fn bootstrap(config: Config) -> ClResult<Arc<AppState>> {
	info!(summary = %config.summary(), "starting gateway");

	// Step 2: load the master-key registry.
	let crypto = Crypto::from_master_key_path(&config.master_key_path, config.current_key_version).map_err(|e| {
		error!("FATAL: failed to load master key: {e}");
		e
	})?;
	for version in discover_additional_key_versions(&config.master_key_path) {
		if version == config.current_key_version {
			continue;
		}
		if let Err(e) = crypto.load_additional_version(&config.master_key_path, version) {
			warn!(version, error = %e, "failed to load additional master key version, records under it will fail to decrypt");
		}
	}

	// Step 3: construct the credential store adapter. Schema creation is
	// idempotent and runs as part of `connect`.
	let store: Arc<dyn gateway_types::store::CredentialStore> =
		Arc::new(SqliteCredentialStore::connect(&config.database_url).await.map_err(|e| {
			error!("FATAL: failed to connect to credential store: {e}");
			e
		})?);

	// Steps 4-6: cache, upstream pool (+ initial refresh), rate limiter,
	// tenant resolver, upstream client.
	let app = AppState::build(config, store, crypto).await.map_err(|e| {
		error!("FATAL: failed to assemble application state: {e}");
		e
	})?;

	info!(
		upstream_credentials = app.upstream_pool.len(),
		"upstream pool bootstrapped"
	);

	Ok(app)
}

/// Re-runs the upstream pool refresh on an existing, already-bootstrapped
/// application. Used by `POST /admin/upstream/refresh` and fails the same
/// way as the initial bootstrap refresh if the resulting pool is empty.
pub async fn refresh_upstream_pool(app: &AppState) -> ClResult<usize> {
	app.upstream_pool.refresh().await.map_err(|e| {
		warn!(error = %e, "upstream pool refresh failed");
		e
	})
}

// vim: ts=4
