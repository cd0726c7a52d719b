//! Encryption-at-rest for durable session records.

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use sha2::{Digest, Sha256};

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// AES-256-GCM sealer for session records stored outside the process.
///
/// The wire format is `base64(nonce || ciphertext)` with a fresh random
/// nonce per seal. The 256-bit key is derived from the operator-supplied
/// secret with SHA-256, so any non-empty string works as a key.
#[derive(Clone)]
pub struct Cipher {
    cipher: Aes256Gcm,
}

impl Cipher {
    /// Derive a cipher from the configured secret.
    pub fn from_secret(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Encrypt plaintext into the transportable representation.
    pub fn seal(&self, plaintext: &[u8]) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CryptoError::EncryptFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(base64::engine::general_purpose::STANDARD.encode(sealed))
    }

    /// Decrypt a value produced by [`Cipher::seal`].
    pub fn open(&self, sealed: &str) -> Result<Vec<u8>, CryptoError> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(sealed)
            .map_err(|_| CryptoError::Malformed)?;
        if raw.len() <= NONCE_LEN {
            return Err(CryptoError::Malformed);
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::DecryptFailed)
    }
}

/// Errors from sealing or opening a stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Encryption itself failed (should not happen with a valid key).
    EncryptFailed,
    /// Stored value was not valid base64 or was too short.
    Malformed,
    /// Authentication tag mismatch: wrong key or corrupted data.
    DecryptFailed,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncryptFailed => write!(f, "Failed to encrypt session record"),
            Self::Malformed => write!(f, "Stored session record is malformed"),
            Self::DecryptFailed => write!(f, "Failed to decrypt session record"),
        }
    }
}

impl std::error::Error for CryptoError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let cipher = Cipher::from_secret("test-key");
        let sealed = cipher.seal(b"{\"created_at\":\"2026-01-01T00:00:00Z\"}").unwrap();
        let opened = cipher.open(&sealed).unwrap();
        assert_eq!(opened, b"{\"created_at\":\"2026-01-01T00:00:00Z\"}");
    }

    #[test]
    fn test_sealed_value_is_not_plaintext() {
        let cipher = Cipher::from_secret("test-key");
        let sealed = cipher.seal(b"created_at").unwrap();
        assert!(!sealed.contains("created_at"));
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let cipher = Cipher::from_secret("test-key");
        let a = cipher.seal(b"same input").unwrap();
        let b = cipher.seal(b"same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_open_rejects_wrong_key() {
        let sealed = Cipher::from_secret("key-one").seal(b"secret").unwrap();
        let err = Cipher::from_secret("key-two").open(&sealed).unwrap_err();
        assert_eq!(err, CryptoError::DecryptFailed);
    }

    #[test]
    fn test_open_rejects_tampered_ciphertext() {
        let cipher = Cipher::from_secret("test-key");
        let sealed = cipher.seal(b"secret").unwrap();

        let mut raw = base64::engine::general_purpose::STANDARD
            .decode(&sealed)
            .unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = base64::engine::general_purpose::STANDARD.encode(raw);

        assert_eq!(cipher.open(&tampered).unwrap_err(), CryptoError::DecryptFailed);
    }

    #[test]
    fn test_open_rejects_garbage() {
        let cipher = Cipher::from_secret("test-key");
        assert_eq!(cipher.open("not base64!!!").unwrap_err(), CryptoError::Malformed);
        assert_eq!(cipher.open("YWJj").unwrap_err(), CryptoError::Malformed);
    }
}
