//! PIN hashing and verification
//!
//! PINs are hashed with unsalted SHA-256 and stored as 64 lowercase hex
//! characters. There is no salt and no attempt limiting; a 4-digit PIN space
//! falls to brute force if a store file and its key leak.

use sha2::{Digest, Sha256};

/// Length of an encoded digest
pub const DIGEST_HEX_LEN: usize = 64;

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityVerifier;

impl IdentityVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Hex-encoded SHA-256 of the PIN
    pub fn hash(&self, pin: &str) -> String {
        hex::encode(Sha256::digest(pin.as_bytes()))
    }

    /// Recompute and compare without an early exit on the first mismatch
    pub fn verify(&self, pin: &str, digest: &str) -> bool {
        let computed = self.hash(pin);
        let (a, b) = (computed.as_bytes(), digest.as_bytes());
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}
