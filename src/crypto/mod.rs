//! Cryptographic primitives for Replicant.
//!
//! This module provides:
//! - P-256 Elliptic Curve Diffie-Hellman key agreement
//! - ChaCha20-Poly1305 AEAD encryption
//! - ANSI X9.63 key derivation over SHA-256
//! - Secure random number generation
//!
//! All secret material is zeroized on drop to prevent memory leakage.

mod aead;
mod kdf;
mod keys;
mod random;

pub use aead::{Aead, AeadKey, Nonce};
pub use kdf::{derive_key, x963_kdf};
pub use keys::{EphemeralSecret, PublicKey, SharedSecret, StaticSecret, SHARED_SECRET_SIZE};
pub use random::{random_padding, SecureRandom};

/// Size of symmetric keys and P-256 scalars in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of AEAD nonce in bytes (96 bits for ChaCha20-Poly1305)
pub const NONCE_SIZE: usize = 12;

/// Size of AEAD authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of an uncompressed SEC1 P-256 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 65;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_key_exchange_and_encryption() {
        // Server generates static keypair (done once)
        let server_static = StaticSecret::random();
        let server_public = PublicKey::from(&server_static);

        // Client generates ephemeral keypair (per connection)
        let client_ephemeral = EphemeralSecret::random();
        let client_public = PublicKey::from(&client_ephemeral).to_bytes();

        let client_key = derive_key(&client_ephemeral.diffie_hellman(&server_public), &client_public);
        let server_key = derive_key(
            &server_static.diffie_hellman(&PublicKey::from_bytes(&client_public).unwrap()),
            &client_public,
        );
        assert_eq!(client_key, server_key);

        let nonce = Nonce::random();
        let mut buffer = b"Hello, secure world!".to_vec();
        Aead::new(&client_key).encrypt_in_place(&nonce, &mut buffer).unwrap();
        Aead::new(&server_key).decrypt_in_place(&nonce, &mut buffer).unwrap();
        assert_eq!(buffer, b"Hello, secure world!");
    }
}
