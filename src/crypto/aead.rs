//! Authenticated Encryption with Associated Data (AEAD).
//!
//! Uses ChaCha20-Poly1305 for chunk sealing. Every chunk carries its own
//! random nonce on the wire, so nonces are drawn from the OS entropy source
//! rather than a counter.

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    ChaCha20Poly1305,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{SecureRandom, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use crate::error::{Error, Result};

/// A symmetric key for AEAD operations.
///
/// Automatically zeroized when dropped.
#[derive(Clone, Debug, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AeadKey([u8; KEY_SIZE]);

impl AeadKey {
    /// Create a new AEAD key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw key bytes.
    ///
    /// # Security
    ///
    /// Handle with care - this is secret key material.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// A nonce for AEAD operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Draw a fresh random nonce.
    pub fn random() -> Self {
        Self(SecureRandom::bytes())
    }

    /// Read a nonce from the front of a chunk.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let nonce: [u8; NONCE_SIZE] = bytes
            .get(..NONCE_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(Error::Buffer {
                expected: NONCE_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self(nonce))
    }

    /// Get the raw nonce bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// ChaCha20-Poly1305 AEAD cipher.
#[derive(Clone)]
pub struct Aead {
    cipher: ChaCha20Poly1305,
}

impl Aead {
    /// Create a new AEAD instance with the given key.
    pub fn new(key: &AeadKey) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(key.as_bytes().into()),
        }
    }

    /// Encrypt in place, appending the tag.
    pub fn encrypt_in_place(&self, nonce: &Nonce, buffer: &mut Vec<u8>) -> Result<()> {
        self.cipher
            .encrypt_in_place(nonce.as_bytes().into(), b"", buffer)
            .map_err(|_| Error::crypto("encryption failed"))
    }

    /// Decrypt in place, stripping the tag.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails (wrong key, tampered data, etc.)
    pub fn decrypt_in_place(&self, nonce: &Nonce, buffer: &mut Vec<u8>) -> Result<()> {
        if buffer.len() < TAG_SIZE {
            return Err(Error::Buffer {
                expected: TAG_SIZE,
                actual: buffer.len(),
            });
        }

        self.cipher
            .decrypt_in_place(nonce.as_bytes().into(), b"", buffer)
            .map_err(|_| Error::crypto("decryption/authentication failed"))
    }
}

impl std::fmt::Debug for Aead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aead").finish_non_exhaustive()
    }
}
