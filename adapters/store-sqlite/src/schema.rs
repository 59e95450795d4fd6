//! Schema initialization: idempotent `CREATE TABLE IF NOT EXISTS` statements
//! run once inside a transaction at pool construction.

use sqlx::SqlitePool;

pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS tenant (
			tenant_id   TEXT PRIMARY KEY,
			name        TEXT NOT NULL,
			plan        TEXT NOT NULL,
			status      TEXT NOT NULL,
			created_at  INTEGER NOT NULL,
			updated_at  INTEGER NOT NULL
		)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS api_key (
			key_id      TEXT PRIMARY KEY,
			tenant_id   TEXT NOT NULL REFERENCES tenant(tenant_id),
			user_id     TEXT NOT NULL,
			key_prefix  TEXT NOT NULL,
			key_hash    TEXT NOT NULL,
			status      TEXT NOT NULL,
			scopes      TEXT NOT NULL,
			expires_at  INTEGER
		)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS api_key_key_hash_idx ON api_key(key_hash)")
		.execute(&mut *tx)
		.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS api_key_tenant_status_idx ON api_key(tenant_id, status)")
		.execute(&mut *tx)
		.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS quota_policy (
			tenant_id          TEXT PRIMARY KEY REFERENCES tenant(tenant_id),
			rpm_limit          INTEGER NOT NULL,
			tpm_limit          INTEGER,
			monthly_token_cap  INTEGER,
			burst_multiplier   REAL NOT NULL
		)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS upstream_key_secret (
			upstream_key_id  TEXT PRIMARY KEY,
			provider         TEXT NOT NULL,
			status           TEXT NOT NULL,
			key_version      INTEGER NOT NULL,
			iv               BLOB NOT NULL,
			ciphertext       BLOB NOT NULL,
			tag              BLOB NOT NULL,
			aad              BLOB
		)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS admin_audit_log (
			id            INTEGER PRIMARY KEY AUTOINCREMENT,
			actor         TEXT NOT NULL,
			action        TEXT NOT NULL,
			target_type   TEXT NOT NULL,
			target_id     TEXT NOT NULL,
			detail_json   TEXT NOT NULL,
			client_ip     TEXT,
			created_at    INTEGER NOT NULL
		)",
	)
	.execute(&mut *tx)
	.await?;

	tx.commit().await
}

// vim: ts=4
