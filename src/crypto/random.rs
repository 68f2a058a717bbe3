//! Secure random number generation.
//!
//! Provides cryptographically secure random bytes using the operating
//! system's entropy source.

use rand::{CryptoRng, Rng, RngCore};
use rand_core::OsRng;

/// Cryptographically secure random number generator.
///
/// Wraps the OS-provided entropy source (e.g., /dev/urandom on Unix,
/// BCryptGenRandom on Windows).
pub struct SecureRandom;

impl SecureRandom {
    /// Fill a buffer with cryptographically secure random bytes.
    pub fn fill(dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }

    /// Generate a fixed-size array of random bytes.
    pub fn bytes<const N: usize>() -> [u8; N] {
        let mut buf = [0u8; N];
        OsRng.fill_bytes(&mut buf);
        buf
    }

    /// Uniform integer in `0..bound`. Returns 0 when `bound` is 0.
    pub fn below(bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        OsRng.gen_range(0..bound)
    }

    /// Get an RNG instance that implements CryptoRng.
    pub fn rng() -> impl RngCore + CryptoRng {
        OsRng
    }
}

/// Generate random padding of the specified length.
pub fn random_padding(len: usize) -> Vec<u8> {
    let mut padding = vec![0u8; len];
    SecureRandom::fill(&mut padding);
    padding
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_secure_random_fill() {
        let mut buf1 = [0u8; 32];
        let mut buf2 = [0u8; 32];

        SecureRandom::fill(&mut buf1);
        SecureRandom::fill(&mut buf2);

        // Should not produce all zeros
        assert!(!buf1.iter().all(|&b| b == 0));
        assert_ne!(buf1, buf2);
    }

    #[test]
    fn test_secure_random_bytes() {
        let bytes1: [u8; 16] = SecureRandom::bytes();
        let bytes2: [u8; 16] = SecureRandom::bytes();

        assert_ne!(bytes1, bytes2);
    }

    #[test]
    fn test_below() {
        let mut seen: HashSet<usize> = HashSet::new();
        for _ in 0..200 {
            let n = SecureRandom::below(512);
            assert!(n < 512);
            seen.insert(n);
        }
        assert!(seen.len() > 1);
        assert_eq!(SecureRandom::below(0), 0);
        assert_eq!(SecureRandom::below(1), 0);
    }

    #[test]
    fn test_random_padding() {
        let padding = random_padding(100);
        assert_eq!(padding.len(), 100);
        assert!(!padding.iter().all(|&b| b == 0));
        assert!(random_padding(0).is_empty());
    }
}
