//! Cryptographic subsystem (C1): AES-256-GCM encrypt/decrypt over versioned
//! master keys, SHA-256 hashing, and random client-credential generation.

use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD as B64, URL_SAFE_NO_PAD};
use gateway_types::error::{ClResult, Error};
use parking_lot::RwLock;
use aes_gcm::aead::rand_core::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
pub const CLIENT_CREDENTIAL_PREFIX: &str = "aic_";
pub const CLIENT_CREDENTIAL_PREFIX_LEN: usize = 12;

/// A ciphertext envelope as stored in `upstream_key_secret`.
#[derive(Clone, Debug)]
pub struct EncryptedRecord {
	pub key_version: u32,
	pub iv: Vec<u8>,
	pub ciphertext: Vec<u8>,
	pub tag: Vec<u8>,
	pub aad: Option<Vec<u8>>,
}

/// Read-only-after-startup map of key version -> 32-byte key. New versions
/// may be added but an existing version is never removed or overwritten.
#[derive(Debug, Default)]
struct MasterKeyRegistry {
	keys: RwLock<HashMap<u32, [u8; KEY_LEN]>>,
}

impl MasterKeyRegistry {
	fn insert(&self, version: u32, key: [u8; KEY_LEN]) {
		self.keys.write().entry(version).or_insert(key);
	}

	fn get(&self, version: u32) -> Option<[u8; KEY_LEN]> {
		self.keys.read().get(&version).copied()
	}
}

#[derive(Debug, Clone)]
pub struct Crypto {
	registry: Arc<MasterKeyRegistry>,
	current_version: u32,
}

/// Loads a 32-byte key from `path`: the file's contents are either 32 raw
/// bytes or the base64 encoding thereof. If `path` does not exist, falls
/// back to `<path>.v<version>`.
pub fn load_master_key_file(path: &Path, version: u32) -> ClResult<[u8; KEY_LEN]> {
	let candidate: PathBuf = if path.exists() {
		path.to_path_buf()
	} else {
		let mut versioned = path.as_os_str().to_os_string();
		versioned.push(format!(".v{version}"));
		PathBuf::from(versioned)
	};

	let raw = std::fs::read(&candidate).map_err(|e| {
		Error::ConfigError(format!("cannot read master key file {}: {e}", candidate.display()))
	})?;

	let bytes = if raw.len() == KEY_LEN {
		raw
	} else {
		B64.decode(
			std::str::from_utf8(&raw)
				.map_err(|_| Error::ConfigError("master key file is not valid UTF-8".into()))?
				.trim(),
		)
		.map_err(|e| Error::ConfigError(format!("master key file is not base64: {e}")))?
	};

	if bytes.len() != KEY_LEN {
		return Err(Error::ConfigError(format!(
			"master key must decode to {KEY_LEN} bytes, got {}",
			bytes.len()
		)));
	}

	let mut key = [0u8; KEY_LEN];
	key.copy_from_slice(&bytes);
	Ok(key)
}

impl Crypto {
	/// Builds a registry containing only `current_version`, loaded from
	/// `master_key_path` (or `<path>.v<current_version>`).
	pub fn from_master_key_path(master_key_path: &Path, current_version: u32) -> ClResult<Self> {
		let key = load_master_key_file(master_key_path, current_version)?;
		let registry = Arc::new(MasterKeyRegistry::default());
		registry.insert(current_version, key);
		Ok(Crypto { registry, current_version })
	}

	/// Registers an additional master key version, used to decrypt records
	/// that predate a key rotation. Never overwrites an existing version.
	pub fn load_additional_version(&self, master_key_path: &Path, version: u32) -> ClResult<()> {
		let key = load_master_key_file(master_key_path, version)?;
		self.registry.insert(version, key);
		Ok(())
	}

	/// SHA-256 over the UTF-8 bytes of `input`, lowercase hex, 64 chars. (P1)
	pub fn hash(input: &str) -> String {
		let digest = Sha256::digest(input.as_bytes());
		hex_lower(&digest)
	}

	/// Draws 32 random bytes, base64url-encodes (no padding), prepends
	/// `aic_`. Returns `(plaintext, prefix, hash)`.
	pub fn generate_client_credential() -> (String, String, String) {
		let mut raw = [0u8; 32];
		OsRng.fill_bytes(&mut raw);
		let body = URL_SAFE_NO_PAD.encode(raw);
		let plaintext = format!("{CLIENT_CREDENTIAL_PREFIX}{body}");
		let prefix = plaintext.chars().take(CLIENT_CREDENTIAL_PREFIX_LEN).collect();
		let hash = Self::hash(&plaintext);
		(plaintext, prefix, hash)
	}

	/// AES-256-GCM encrypt under the current master key version.
	pub fn encrypt(&self, plaintext: &[u8], aad: Option<&[u8]>) -> ClResult<EncryptedRecord> {
		let key = self
			.registry
			.get(self.current_version)
			.ok_or_else(|| Error::CryptoError("current master key version not loaded".into()))?;
		let cipher = Aes256Gcm::new_from_slice(&key)
			.map_err(|e| Error::CryptoError(format!("invalid key material: {e}")))?;

		let mut nonce_bytes = [0u8; NONCE_LEN];
		OsRng.fill_bytes(&mut nonce_bytes);
		let nonce = Nonce::from_slice(&nonce_bytes);

		let payload = Payload { msg: plaintext, aad: aad.unwrap_or(&[]) };
		let sealed = cipher
			.encrypt(nonce, payload)
			.map_err(|e| Error::CryptoError(format!("encryption failed: {e}")))?;

		// `aes_gcm::encrypt` appends the 16-byte tag to the ciphertext.
		let tag_start = sealed.len().saturating_sub(16);
		let (ciphertext, tag) = sealed.split_at(tag_start);

		Ok(EncryptedRecord {
			key_version: self.current_version,
			iv: nonce_bytes.to_vec(),
			ciphertext: ciphertext.to_vec(),
			tag: tag.to_vec(),
			aad: aad.map(<[u8]>::to_vec),
		})
	}

	/// AES-256-GCM decrypt using the master key version recorded on the
	/// record. Tag-verification and AAD-mismatch failures both surface as
	/// `CryptoError` ("tampering"); a missing key version surfaces
	/// distinctly ("cannot decrypt" / operator misconfiguration). (P2)
	pub fn decrypt(&self, record: &EncryptedRecord) -> ClResult<Vec<u8>> {
		let key = self.registry.get(record.key_version).ok_or_else(|| {
			Error::CryptoError(format!(
				"master key version {} is not loaded",
				record.key_version
			))
		})?;
		let cipher = Aes256Gcm::new_from_slice(&key)
			.map_err(|e| Error::CryptoError(format!("invalid key material: {e}")))?;

		if record.iv.len() != NONCE_LEN {
			return Err(Error::CryptoError("invalid nonce length".into()));
		}
		let nonce = Nonce::from_slice(&record.iv);

		let mut sealed = Vec::with_capacity(record.ciphertext.len() + record.tag.len());
		sealed.extend_from_slice(&record.ciphertext);
		sealed.extend_from_slice(&record.tag);

		let aad = record.aad.as_deref().unwrap_or(&[]);
		let payload = Payload { msg: &sealed, aad };

		cipher
			.decrypt(nonce, payload)
			.map_err(|_| Error::CryptoError("integrity check failed".into()))
	}
}

fn hex_lower(bytes: &[u8]) -> String {
	let mut out = String::with_capacity(bytes.len() * 2);
	for b in bytes {
		out.push_str(&format!("{b:02x}"));
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn crypto_with_temp_key() -> (Crypto, tempfile::TempDir) {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("master.key");
		let mut key = [0u8; KEY_LEN];
		OsRng.fill_bytes(&mut key);
		let mut f = std::fs::File::create(&path).unwrap();
		f.write_all(&key).unwrap();
		(Crypto::from_master_key_path(&path, 1).unwrap(), dir)
	}

	#[test]
	fn hash_is_64_lowercase_hex() {
		let h = Crypto::hash("hello world");
		assert_eq!(h.len(), 64);
		assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
		// Known SHA-256("hello world")
		assert_eq!(h, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde");
	}

	#[test]
	fn generated_credential_has_expected_shape() {
		let (plaintext, prefix, hash) = Crypto::generate_client_credential();
		assert!(plaintext.starts_with(CLIENT_CREDENTIAL_PREFIX));
		assert_eq!(prefix.len(), CLIENT_CREDENTIAL_PREFIX_LEN);
		assert_eq!(hash, Crypto::hash(&plaintext));
	}

	#[test]
	fn round_trip_crypto() {
		let (crypto, _dir) = crypto_with_temp_key();
		let record = crypto.encrypt(b"sk-upstream-secret", Some(b"tenant:demo")).unwrap();
		let plaintext = crypto.decrypt(&record).unwrap();
		assert_eq!(plaintext, b"sk-upstream-secret");
	}

	#[test]
	fn tampered_ciphertext_fails_closed() {
		let (crypto, _dir) = crypto_with_temp_key();
		let mut record = crypto.encrypt(b"sk-upstream-secret", None).unwrap();
		let last = record.ciphertext.len() - 1;
		record.ciphertext[last] ^= 0x01;
		assert!(crypto.decrypt(&record).is_err());
	}

	#[test]
	fn tampered_tag_fails_closed() {
		let (crypto, _dir) = crypto_with_temp_key();
		let mut record = crypto.encrypt(b"sk-upstream-secret", None).unwrap();
		record.tag[0] ^= 0x01;
		assert!(crypto.decrypt(&record).is_err());
	}

	#[test]
	fn mismatched_aad_fails_closed() {
		let (crypto, _dir) = crypto_with_temp_key();
		let mut record = crypto.encrypt(b"sk-upstream-secret", Some(b"tenant:demo")).unwrap();
		record.aad = Some(b"tenant:other".to_vec());
		assert!(crypto.decrypt(&record).is_err());
	}

	#[test]
	fn missing_key_version_surfaces_distinctly() {
		let (crypto, _dir) = crypto_with_temp_key();
		let mut record = crypto.encrypt(b"sk-upstream-secret", None).unwrap();
		record.key_version = 99;
		let err = crypto.decrypt(&record).unwrap_err();
		assert!(matches!(err, Error::CryptoError(msg) if msg.contains("not loaded")));
	}

	proptest::proptest! {
		#[test]
		fn prop_hash_stability(s in ".*") {
			let h = Crypto::hash(&s);
			proptest::prop_assert_eq!(h.len(), 64);
			proptest::prop_assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
		}

		#[test]
		fn prop_round_trip(p in proptest::collection::vec(proptest::num::u8::ANY, 0..256)) {
			let (crypto, _dir) = crypto_with_temp_key();
			let record = crypto.encrypt(&p, None).unwrap();
			let decrypted = crypto.decrypt(&record).unwrap();
			proptest::prop_assert_eq!(decrypted, p);
		}
	}
}

// vim: ts=4
