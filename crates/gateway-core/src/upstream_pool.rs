//! Upstream Pool (C4): decrypted upstream credentials with round-robin
//! selection and atomic hot-swap.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use arc_swap::ArcSwap;
use gateway_types::error::{ClResult, Error};
use gateway_types::model::UpstreamCredentialStatus;
use gateway_types::store::CredentialStore;

use crate::crypto::{Crypto, EncryptedRecord};

/// `n.rem_euclid(m)` computes the Euclidean remainder, which is always in
/// `[0, m)` even for negative `n` - the `floorMod` the spec requires so
/// counter wraparound to negative values never yields a negative index. (P4)
fn floor_mod(n: i64, m: i64) -> usize {
	n.rem_euclid(m) as usize
}

#[derive(Debug)]
pub struct UpstreamPool {
	store: Arc<dyn CredentialStore>,
	crypto: Crypto,
	fallback: Vec<String>,
	keys: ArcSwap<Vec<String>>,
	counter: AtomicI64,
}

impl UpstreamPool {
	/// Constructs the pool and runs an initial `refresh()`. Fails startup if
	/// the resulting pool would be empty.
	pub async fn bootstrap(
		store: Arc<dyn CredentialStore>,
		crypto: Crypto,
		fallback: Vec<String>,
	) -> ClResult<Self> {
		let pool = UpstreamPool {
			store,
			crypto,
			fallback,
			keys: ArcSwap::from_pointee(Vec::new()),
			counter: AtomicI64::new(0),
		};
		pool.refresh().await?;
		Ok(pool)
	}

	/// Re-reads the store, decrypts each active upstream credential, unions
	/// with the static fallback list (store entries first, deduplicated),
	/// and atomically swaps in the new sequence. The counter is preserved.
	pub async fn refresh(&self) -> ClResult<usize> {
		let records = self.store.list_active_upstream_credentials().await?;

		let mut decrypted = Vec::with_capacity(records.len());
		for record in records {
			if record.status != UpstreamCredentialStatus::Active {
				continue;
			}
			let enc = EncryptedRecord {
				key_version: record.key_version,
				iv: record.iv,
				ciphertext: record.ciphertext,
				tag: record.tag,
				aad: record.aad,
			};
			match self.crypto.decrypt(&enc) {
				Ok(bytes) => match String::from_utf8(bytes) {
					Ok(key) => decrypted.push(key),
					Err(e) => tracing::warn!(
						upstream_key_id = %record.upstream_key_id,
						error = %e,
						"decrypted upstream credential was not valid UTF-8, skipping"
					),
				},
				Err(e) => tracing::warn!(
					upstream_key_id = %record.upstream_key_id,
					error = %e,
					"failed to decrypt upstream credential, skipping"
				),
			}
		}

		let mut seen: std::collections::HashSet<String> = decrypted.iter().cloned().collect();
		for fb in &self.fallback {
			if seen.insert(fb.clone()) {
				decrypted.push(fb.clone());
			}
		}

		if decrypted.is_empty() {
			return Err(Error::ConfigError(
				"upstream pool would be empty: no active store credentials and no fallback keys"
					.into(),
			));
		}

		let count = decrypted.len();
		self.keys.store(Arc::new(decrypted));
		Ok(count)
	}

	/// Returns `keys[floorMod(counter++, |keys|)]`. (P3, P4)
	pub fn next_key(&self) -> ClResult<String> {
		let snapshot = self.keys.load();
		if snapshot.is_empty() {
			return Err(Error::Internal("upstream pool is empty".into()));
		}
		let n = self.counter.fetch_add(1, Ordering::Relaxed);
		let idx = floor_mod(n, snapshot.len() as i64);
		Ok(snapshot[idx].clone())
	}

	pub fn len(&self) -> usize {
		self.keys.load().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use super::floor_mod;

	#[test]
	fn floor_mod_handles_negative_dividend() {
		assert_eq!(floor_mod(-1, 3), 2);
		assert_eq!(floor_mod(i64::MIN, 3), floor_mod(i64::MIN.wrapping_add(3), 3));
	}

	#[test]
	fn floor_mod_matches_naive_for_positive_dividend() {
		for n in 0..20i64 {
			assert_eq!(floor_mod(n, 3), (n % 3) as usize);
		}
	}

	proptest::proptest! {
		#[test]
		fn prop_round_robin_fairness(n in 1usize..16, k in 1usize..20) {
			use std::sync::atomic::{AtomicI64, Ordering};
			let counter = AtomicI64::new(0);
			let mut counts = vec![0usize; n];
			for _ in 0..(n * k) {
				let c = counter.fetch_add(1, Ordering::Relaxed);
				let idx = floor_mod(c, n as i64);
				counts[idx] += 1;
			}
			for c in counts {
				proptest::prop_assert_eq!(c, k);
			}
		}

		#[test]
		fn prop_floor_mod_never_negative(n in i64::MIN..i64::MAX, m in 1i64..64) {
			let idx = floor_mod(n, m);
			proptest::prop_assert!(idx < m as usize);
		}
	}
}

// vim: ts=4
