//! Crypto engine - key derivation and authenticated encryption
//!
//! Sealed payload layout: `nonce (12) || ciphertext || tag (16)`, AES-256-GCM.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};

use crate::domain::result::{Error, Result};
use crate::domain::Argon2Params;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = ring::aead::NONCE_LEN;
pub const TAG_LEN: usize = 16;

/// A 256-bit symmetric key
#[derive(Clone, PartialEq, Eq)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    fn aead(&self) -> Result<LessSafeKey> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.0)
            .map_err(|_| Error::Encryption("invalid AES-256 key".to_string()))?;
        Ok(LessSafeKey::new(unbound))
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Key(..)")
    }
}

/// Map arbitrary key material to a key by truncating or zero-padding
///
/// No stretching: a short passphrase gives a weak key. See
/// [`derive_key_argon2`] for the opt-in stretched variant.
pub fn derive_key(material: &[u8]) -> Key {
    let mut key = [0u8; KEY_LEN];
    let n = material.len().min(KEY_LEN);
    key[..n].copy_from_slice(&material[..n]);
    Key(key)
}

/// Derive a key from a passphrase using Argon2id
pub fn derive_key_argon2(passphrase: &[u8], salt: &[u8], params: &Argon2Params) -> Result<Key> {
    let argon2_params = argon2::Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| Error::Encryption(format!("Failed to create argon2 params: {:?}", e)))?;

    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    );

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(passphrase, salt, &mut key)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {:?}", e)))?;

    Ok(Key(key))
}

/// Encrypt and authenticate `plaintext` under a fresh random nonce
pub fn seal(plaintext: &[u8], key: &Key) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| Error::Encryption("system random generator unavailable".to_string()))?;

    let mut in_out = plaintext.to_vec();
    key.aead()?
        .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
        .map_err(|_| Error::Encryption("seal failed".to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&in_out);
    Ok(sealed)
}

/// Verify and decrypt a payload produced by [`seal`]
///
/// Any tag mismatch (wrong key, flipped bit, truncation) is reported as
/// [`Error::Authentication`]; no plaintext is ever returned in that case.
pub fn open(sealed: &[u8], key: &Key) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(Error::Authentication(format!(
            "sealed payload too short ({} bytes)",
            sealed.len()
        )));
    }

    let (nonce, body) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce)
        .map_err(|_| Error::Authentication("malformed nonce".to_string()))?;

    let mut in_out = body.to_vec();
    let plaintext_len = key
        .aead()?
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| Error::Authentication("tag verification failed".to_string()))?
        .len();
    in_out.truncate(plaintext_len);
    Ok(in_out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let key = derive_key(b"correct horse battery staple");
        let payloads: [&[u8]; 4] = [b"", b"x", b"{\"accounts\":{}}", &[0u8; 4096]];
        for payload in payloads {
            let sealed = seal(payload, &key).unwrap();
            assert_eq!(sealed.len(), NONCE_LEN + payload.len() + TAG_LEN);
            assert_eq!(open(&sealed, &key).unwrap(), payload);
        }
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let sealed = seal(b"balance data", &derive_key(b"right")).unwrap();
        let err = open(&sealed, &derive_key(b"wrong")).unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn test_every_flipped_bit_is_detected() {
        let key = derive_key(b"k");
        let sealed = seal(b"ledger", &key).unwrap();
        for byte in 0..sealed.len() {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered[byte] ^= 1 << bit;
                assert!(
                    matches!(open(&tampered, &key), Err(Error::Authentication(_))),
                    "flip at byte {} bit {} went unnoticed",
                    byte,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_truncated_payload_fails() {
        let key = derive_key(b"k");
        let sealed = seal(b"ledger", &key).unwrap();
        assert!(open(&sealed[..NONCE_LEN + TAG_LEN - 1], &key).is_err());
        assert!(open(&sealed[..sealed.len() - 1], &key).is_err());
    }

    #[test]
    fn test_nonce_is_fresh_per_seal() {
        let key = derive_key(b"k");
        let a = seal(b"same", &key).unwrap();
        let b = seal(b"same", &key).unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_key_truncates_and_pads() {
        let short = derive_key(b"abc");
        assert_eq!(&short.0[..3], b"abc");
        assert!(short.0[3..].iter().all(|&b| b == 0));

        let long = derive_key(&[7u8; 100]);
        assert_eq!(long.0, [7u8; KEY_LEN]);

        assert_eq!(derive_key(b"same"), derive_key(b"same"));
    }

    #[test]
    fn test_argon2_is_deterministic_per_salt() {
        let params = Argon2Params {
            time_cost: 1,
            memory_cost: 1024,
            parallelism: 1,
            hash_len: 32,
        };
        let a = derive_key_argon2(b"pass", b"0123456789abcdef", &params).unwrap();
        let b = derive_key_argon2(b"pass", b"0123456789abcdef", &params).unwrap();
        let c = derive_key_argon2(b"pass", b"fedcba9876543210", &params).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_key_debug_is_redacted() {
        assert_eq!(format!("{:?}", derive_key(b"secret")), "Key(..)");
    }
}
