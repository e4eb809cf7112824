//! Credential encryption
//!
//! AES-256-GCM cipher for bind passwords stored in the domain registry.
//! The key is supplied externally at process start (base64, 32 bytes) and
//! is never generated here: a silently generated key would orphan every
//! row encrypted under the previous one. Ciphertext is stored as
//! `base64(nonce):base64(ciphertext)`.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;

use crate::errors::{DirectoryError, Result};
use crate::secure_types::SecureString;

/// Symmetric cipher for bind passwords.
///
/// Constructed once at startup and injected into the registry and the
/// connection broker; no module-level state.
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    /// Creates a cipher from a base64-encoded 32-byte key.
    pub fn from_key_b64(key_b64: &str) -> Result<Self> {
        let key_bytes = general_purpose::STANDARD
            .decode(key_b64.trim())
            .map_err(|e| DirectoryError::Config(format!("Cipher key is not valid base64: {}", e)))?;

        if key_bytes.len() != 32 {
            return Err(DirectoryError::Config(format!(
                "Cipher key must be 32 bytes, got {}",
                key_bytes.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| DirectoryError::Config(format!("Failed to create cipher: {}", e)))?;

        Ok(Self { cipher })
    }

    /// Encrypts a plaintext password for persistence.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| DirectoryError::Decryption(format!("Encryption failed: {}", e)))?;

        Ok(format!(
            "{}:{}",
            general_purpose::STANDARD.encode(nonce_bytes),
            general_purpose::STANDARD.encode(&ciphertext)
        ))
    }

    /// Decrypts stored ciphertext back into a zeroizing container.
    ///
    /// Fails with `Decryption` on a malformed envelope, a tampered
    /// ciphertext, or a key mismatch. Callers must propagate the failure,
    /// never treat it as "no password".
    pub fn decrypt(&self, encrypted: &str) -> Result<SecureString> {
        let parts: Vec<&str> = encrypted.split(':').collect();
        if parts.len() != 2 {
            return Err(DirectoryError::Decryption(
                "Invalid encrypted password format".to_string(),
            ));
        }

        let nonce_bytes = general_purpose::STANDARD
            .decode(parts[0])
            .map_err(|e| DirectoryError::Decryption(format!("Failed to decode nonce: {}", e)))?;
        if nonce_bytes.len() != 12 {
            return Err(DirectoryError::Decryption(
                "Invalid nonce length".to_string(),
            ));
        }
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = general_purpose::STANDARD
            .decode(parts[1])
            .map_err(|e| DirectoryError::Decryption(format!("Failed to decode ciphertext: {}", e)))?;

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|_| {
                DirectoryError::Decryption(
                    "Ciphertext rejected (tampered data or key mismatch)".to_string(),
                )
            })?;

        let plaintext = String::from_utf8(plaintext).map_err(|_| {
            DirectoryError::Decryption("Decrypted password is not valid UTF-8".to_string())
        })?;

        Ok(SecureString::new(plaintext))
    }
}
