// Credential encryption for node configuration rows

//! # Credential Encryption
//!
//! GenAI API keys and module API credentials are stored encrypted. The key is
//! injected at construction (never read from a global), so tests can swap in
//! [`PlaintextDecryptor`].
//!
//! Ciphertext format: `base64(nonce ‖ ciphertext ‖ tag)` using AES-256-GCM.
//!
//! ## Rust Learning Notes:
//!
//! ### ring's AEAD API
//! `LessSafeKey` seals and opens buffers in place. "Less safe" only means the
//! caller is responsible for never reusing a nonce; every call here draws a
//! fresh 96-bit nonce from `SystemRandom`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

use crate::{BlitzError, Result};

/// Turns stored ciphertext back into a secret
pub trait Decryptor: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> Result<String>;
}

/// Turns a secret into storable ciphertext
pub trait Encryptor: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String>;
}

/// AES-256-GCM implementation of both traits
pub struct AesGcmDecryptor {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl AesGcmDecryptor {
    pub fn new(key_bytes: &[u8]) -> Result<Self> {
        let unbound = UnboundKey::new(&AES_256_GCM, key_bytes)
            .map_err(|_| BlitzError::Crypto("encryption key must be 32 bytes".to_string()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Build from a base64-encoded 32-byte key
    pub fn from_base64_key(encoded: &str) -> Result<Self> {
        let key_bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| BlitzError::Crypto(format!("encryption key is not valid base64: {}", e)))?;
        Self::new(&key_bytes)
    }

    /// Fresh random key, base64-encoded
    pub fn generate_key() -> Result<String> {
        let mut key = [0u8; 32];
        SystemRandom::new()
            .fill(&mut key)
            .map_err(|_| BlitzError::Crypto("random source unavailable".to_string()))?;
        Ok(STANDARD.encode(key))
    }
}

impl Encryptor for AesGcmDecryptor {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| BlitzError::Crypto("random source unavailable".to_string()))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce_bytes), Aad::empty(), &mut in_out)
            .map_err(|_| BlitzError::Crypto("encryption failed".to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + in_out.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&in_out);
        Ok(STANDARD.encode(combined))
    }
}

impl Decryptor for AesGcmDecryptor {
    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        // Error messages never echo the input
        let bytes = STANDARD
            .decode(ciphertext.trim())
            .map_err(|_| BlitzError::Crypto("ciphertext is not valid base64".to_string()))?;
        if bytes.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(BlitzError::Crypto("ciphertext is truncated".to_string()));
        }

        let (nonce_bytes, sealed) = bytes.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| BlitzError::Crypto("invalid nonce".to_string()))?;
        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| BlitzError::Crypto("authentication failed".to_string()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| BlitzError::Crypto("decrypted secret is not UTF-8".to_string()))
    }
}

/// Identity transform, for development and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextDecryptor;

impl Decryptor for PlaintextDecryptor {
    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        Ok(ciphertext.to_string())
    }
}

impl Encryptor for PlaintextDecryptor {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        Ok(plaintext.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> AesGcmDecryptor {
        AesGcmDecryptor::from_base64_key(&AesGcmDecryptor::generate_key().unwrap()).unwrap()
    }

    #[test]
    fn test_encrypt_uses_fresh_nonce() {
        let cipher = cipher();
        let first = cipher.encrypt("sk-live-123").unwrap();
        let second = cipher.encrypt("sk-live-123").unwrap();
        assert_ne!(first, second);
        assert_eq!(cipher.decrypt(&first).unwrap(), "sk-live-123");
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected_without_echo() {
        let cipher = cipher();
        let sealed = cipher.encrypt("secret-value").unwrap();
        let mut bytes = STANDARD.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let err = cipher.decrypt(&STANDARD.encode(bytes)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("authentication failed"));
        assert!(!message.contains("secret-value"));
    }

    #[test]
    fn test_wrong_key_cannot_decrypt() {
        let sealed = cipher().encrypt("abc").unwrap();
        assert!(cipher().decrypt(&sealed).is_err());
    }

    #[test]
    fn test_key_length_is_checked() {
        assert!(AesGcmDecryptor::new(&[0u8; 16]).is_err());
        assert!(AesGcmDecryptor::from_base64_key("not base64!").is_err());
        assert!(cipher().decrypt("AAAA").is_err());
    }
}
