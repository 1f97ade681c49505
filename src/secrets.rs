//! Secret envelopes
//!
//! Credential fields in remote backup configurations arrive wrapped in an
//! encrypted-value envelope of the form `enc:id=<cipher-id>:<payload>:end`.
//! The `SecretStore` collaborator decrypts an envelope immediately before
//! the value is used; decrypted values are carried in zeroizing buffers and
//! are never persisted or logged.
//!
//! The file-keyed store implements cipher id `1`: AES-256-GCM with a random
//! 96-bit nonce, keyed from a raw 32-byte key file. The payload is the
//! base64 encoding of `nonce || ciphertext+tag`.

use std::path::Path;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{VaultError, VaultResult};

/// Identifier of the AES-256-GCM cipher in envelope metadata
const CIPHER_ID: &str = "1";

/// Size of the AES-GCM nonce in bytes (96 bits)
const NONCE_SIZE: usize = 12;

/// Size of the raw key file in bytes (AES-256)
const KEY_SIZE: usize = 32;

/// Decrypts secret envelopes for remote strategies
pub trait SecretStore {
    /// Decrypt an envelope into its plaintext value.
    fn decrypt(&self, value: &str) -> VaultResult<Zeroizing<String>>;
}

/// Check whether a value has the envelope shape.
pub fn is_envelope(value: &str) -> bool {
    value.starts_with("enc:") && value.ends_with(":end")
}

/// AES-256-GCM secret store keyed from a raw key file
pub struct FileKeyStore {
    key: Zeroizing<Vec<u8>>,
}

impl FileKeyStore {
    /// Load the key from an existing key file.
    pub fn load(key_file: &Path) -> VaultResult<Self> {
        let key = std::fs::read(key_file).map_err(|e| {
            VaultError::Secret(format!("Failed to read key file {}: {}", key_file.display(), e))
        })?;

        if key.len() != KEY_SIZE {
            return Err(VaultError::Secret(format!(
                "Key file {} must contain exactly {} bytes, found {}",
                key_file.display(),
                KEY_SIZE,
                key.len()
            )));
        }

        Ok(Self {
            key: Zeroizing::new(key),
        })
    }

    /// Load the key file, generating a fresh random key if it is missing.
    pub fn load_or_generate(key_file: &Path) -> VaultResult<Self> {
        if !key_file.exists() {
            debug!("Creating key file at {}", key_file.display());
            let mut key = [0u8; KEY_SIZE];
            OsRng.fill_bytes(&mut key);
            if let Some(parent) = key_file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(key_file, key).map_err(|e| {
                VaultError::Secret(format!(
                    "Failed to create key file {}: {}",
                    key_file.display(),
                    e
                ))
            })?;
        }

        Self::load(key_file)
    }

    /// Wrap a plaintext value in an encrypted envelope.
    pub fn encrypt(&self, plaintext: &str) -> VaultResult<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| VaultError::Secret(format!("Failed to create cipher: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| VaultError::Secret(format!("Encryption failed: {}", e)))?;

        let mut payload = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);

        Ok(format!("enc:id={}:{}:end", CIPHER_ID, STANDARD.encode(payload)))
    }
}

impl SecretStore for FileKeyStore {
    fn decrypt(&self, value: &str) -> VaultResult<Zeroizing<String>> {
        let parts: Vec<&str> = value.splitn(4, ':').collect();
        if parts.len() != 4 || parts[0] != "enc" || parts[3] != "end" {
            return Err(VaultError::Secret(
                "Encrypted data must have format [enc:<metadata>:<data>:end]".to_string(),
            ));
        }

        let cipher_id = parts[1]
            .split(',')
            .find_map(|item| item.strip_prefix("id="))
            .ok_or_else(|| {
                VaultError::Secret(format!("Envelope metadata [{}] carries no cipher id", parts[1]))
            })?;
        if cipher_id != CIPHER_ID {
            return Err(VaultError::Secret(format!(
                "Unsupported cipher id [{}]",
                cipher_id
            )));
        }

        let payload = STANDARD
            .decode(parts[2])
            .map_err(|e| VaultError::Secret(format!("Invalid envelope encoding: {}", e)))?;
        if payload.len() <= NONCE_SIZE {
            return Err(VaultError::Secret("Envelope payload is truncated".to_string()));
        }
        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_SIZE);

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| VaultError::Secret(format!("Failed to create cipher: {}", e)))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| {
                VaultError::Secret("Decryption failed: wrong key or corrupted data".to_string())
            })?;

        String::from_utf8(plaintext)
            .map(Zeroizing::new)
            .map_err(|_| VaultError::Secret("Decrypted value is not valid UTF-8".to_string()))
    }
}

/// Store used when no key file is configured; every decryption fails.
pub struct MissingKeyStore;

impl SecretStore for MissingKeyStore {
    fn decrypt(&self, _value: &str) -> VaultResult<Zeroizing<String>> {
        Err(VaultError::Secret(
            "No key_file configured; cannot decrypt remote credentials".to_string(),
        ))
    }
}

/// Pass-through store for tests
#[cfg(test)]
pub(crate) struct PlaintextStore;

#[cfg(test)]
impl SecretStore for PlaintextStore {
    fn decrypt(&self, value: &str) -> VaultResult<Zeroizing<String>> {
        Ok(Zeroizing::new(value.to_string()))
    }
}
