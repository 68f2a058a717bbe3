//! P-256 key agreement primitives.
//!
//! Provides type-safe wrappers around NIST P-256 scalar multiplication with
//! automatic zeroization of secret material on drop. Public keys travel on
//! the wire in uncompressed SEC1 form (`0x04 || X || Y`, 65 bytes), and the
//! shared secret is the uncompressed encoding of the whole shared point.

use p256::elliptic_curve::group::Curve;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;
use rand_core::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{KEY_SIZE, PUBLIC_KEY_SIZE};
use crate::error::{Error, Result};

/// Size of the encoded shared point fed into the KDF.
pub const SHARED_SECRET_SIZE: usize = PUBLIC_KEY_SIZE;

fn shared_point(secret: &SecretKey, their_public: &PublicKey) -> SharedSecret {
    let point = (their_public.0.to_projective() * *secret.to_nonzero_scalar()).to_affine();
    let encoded = point.to_encoded_point(false);

    let mut bytes = [0u8; SHARED_SECRET_SIZE];
    bytes.copy_from_slice(encoded.as_bytes());
    SharedSecret(bytes)
}

/// An ephemeral (single-use) P-256 secret key.
///
/// Generated fresh for each client connection.
pub struct EphemeralSecret(SecretKey);

impl EphemeralSecret {
    /// Generate a new random ephemeral secret.
    pub fn random() -> Self {
        Self(SecretKey::random(&mut OsRng))
    }

    /// Compute the shared point with the peer's public key.
    pub fn diffie_hellman(self, their_public: &PublicKey) -> SharedSecret {
        shared_point(&self.0, their_public)
    }
}

impl From<&EphemeralSecret> for PublicKey {
    fn from(secret: &EphemeralSecret) -> Self {
        PublicKey(secret.0.public_key())
    }
}

/// A static (long-term) P-256 secret key.
///
/// Used by servers for persistent identity. Automatically zeroized when
/// dropped.
#[derive(Clone)]
pub struct StaticSecret(SecretKey);

impl StaticSecret {
    /// Generate a new random static secret.
    pub fn random() -> Self {
        Self(SecretKey::random(&mut OsRng))
    }

    /// Create from a 32-byte big-endian scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        SecretKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| Error::key_exchange("invalid P-256 private key"))
    }

    /// Compute the shared point with the peer's public key.
    pub fn diffie_hellman(&self, their_public: &PublicKey) -> SharedSecret {
        shared_point(&self.0, their_public)
    }

    /// Export the secret scalar bytes.
    pub fn to_bytes(&self) -> Zeroizing<[u8; KEY_SIZE]> {
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        bytes.copy_from_slice(&self.0.to_bytes());
        bytes
    }
}

impl From<&StaticSecret> for PublicKey {
    fn from(secret: &StaticSecret) -> Self {
        PublicKey(secret.0.public_key())
    }
}

/// A P-256 public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(p256::PublicKey);

impl PublicKey {
    /// Parse an uncompressed (or compressed) SEC1 point.
    ///
    /// Rejects the identity and points that are not on the curve.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        p256::PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| Error::key_exchange("malformed P-256 public key"))
    }

    /// Uncompressed SEC1 encoding.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        let encoded = self.0.to_encoded_point(false);
        let mut bytes = [0u8; PUBLIC_KEY_SIZE];
        bytes.copy_from_slice(encoded.as_bytes());
        bytes
    }
}

/// The encoded shared point of a P-256 key agreement.
///
/// Feed into [`x963_kdf`](crate::crypto::x963_kdf) before use as a key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; SHARED_SECRET_SIZE]);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ephemeral_static_key_exchange() {
        let server_static = StaticSecret::random();
        let server_public = PublicKey::from(&server_static);

        let client_ephemeral = EphemeralSecret::random();
        let client_public = PublicKey::from(&client_ephemeral);

        let client_shared = client_ephemeral.diffie_hellman(&server_public);
        let server_shared = server_static.diffie_hellman(&client_public);

        assert_eq!(client_shared.as_bytes(), server_shared.as_bytes());
        assert_eq!(client_shared.as_bytes()[0], 0x04);
    }

    #[test]
    fn test_public_key_serialization() {
        let secret = StaticSecret::random();
        let public = PublicKey::from(&secret);

        let bytes = public.to_bytes();
        assert_eq!(bytes.len(), PUBLIC_KEY_SIZE);
        assert_eq!(bytes[0], 0x04);

        let restored = PublicKey::from_bytes(&bytes).unwrap();
        assert_eq!(public, restored);
    }

    #[test]
    fn test_static_secret_serialization() {
        let secret1 = StaticSecret::random();
        let bytes = secret1.to_bytes();
        let secret2 = StaticSecret::from_bytes(bytes.as_slice()).unwrap();

        assert_eq!(PublicKey::from(&secret1), PublicKey::from(&secret2));
    }

    #[test]
    fn test_malformed_public_key() {
        assert!(PublicKey::from_bytes(&[0u8; PUBLIC_KEY_SIZE]).is_err());

        let mut bytes = PublicKey::from(&StaticSecret::random()).to_bytes();
        bytes[40] ^= 0xff;
        assert!(PublicKey::from_bytes(&bytes).is_err());

        assert!(StaticSecret::from_bytes(&[0u8; KEY_SIZE]).is_err());
        assert!(StaticSecret::from_bytes(&[1u8; 5]).is_err());
    }
}
