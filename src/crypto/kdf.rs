//! Key derivation.
//!
//! ANSI X9.63 KDF over SHA-256:
//!
//! ```text
//!   K = SHA256(Z || 00000001 || SharedInfo) || SHA256(Z || 00000002 || SharedInfo) || ...
//! ```
//!
//! truncated to the requested length. `Z` is the encoded shared point and
//! `SharedInfo` is the client's public key.

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::crypto::{AeadKey, SharedSecret, KEY_SIZE};

/// Expand `seed` into `len` bytes with the X9.63 construction.
pub fn x963_kdf(seed: &[u8], shared_info: &[u8], len: usize) -> Zeroizing<Vec<u8>> {
    let mut output = Zeroizing::new(Vec::with_capacity(len + Sha256::output_size()));
    let mut counter: u32 = 1;

    while output.len() < len {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(counter.to_be_bytes());
        hasher.update(shared_info);
        output.extend_from_slice(&hasher.finalize());
        counter = counter.wrapping_add(1);
    }

    output.truncate(len);
    output
}

/// Derive the polish AEAD key from a shared point and the client public key.
pub fn derive_key(shared: &SharedSecret, client_public: &[u8]) -> AeadKey {
    let okm = x963_kdf(shared.as_bytes(), client_public, KEY_SIZE);
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&okm);
    AeadKey::from_bytes(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{EphemeralSecret, PublicKey, StaticSecret};

    #[test]
    fn test_single_block_matches_sha256() {
        let seed = b"seed";
        let info = b"info";

        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update([0, 0, 0, 1]);
        hasher.update(info);
        let expected = hasher.finalize();

        let okm = x963_kdf(seed, info, 32);
        assert_eq!(okm.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_multi_block_counter() {
        let okm = x963_kdf(b"z", b"", 40);
        assert_eq!(okm.len(), 40);

        let mut hasher = Sha256::new();
        hasher.update(b"z");
        hasher.update([0, 0, 0, 2]);
        let second = hasher.finalize();
        assert_eq!(&okm[32..], &second[..8]);
    }

    #[test]
    fn test_shared_info_changes_output() {
        assert_ne!(x963_kdf(b"z", b"a", 32).as_slice(), x963_kdf(b"z", b"b", 32).as_slice());
    }

    #[test]
    fn test_both_sides_derive_same_key() {
        let server = StaticSecret::random();
        let server_public = PublicKey::from(&server);
        let client = EphemeralSecret::random();
        let client_public = PublicKey::from(&client).to_bytes();

        let client_key = derive_key(&client.diffie_hellman(&server_public), &client_public);
        let server_shared = server.diffie_hellman(&PublicKey::from_bytes(&client_public).unwrap());
        let server_key = derive_key(&server_shared, &client_public);

        assert_eq!(client_key, server_key);
    }
}
