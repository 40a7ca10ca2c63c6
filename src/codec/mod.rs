//! Reversible identifier codec.
//!
//! Database keys are sequential integers; handing them to clients would leak
//! row counts and invite enumeration. The codec maps an internal `i64` to an
//! opaque token and back, keyed by the server secret: one AES-128 block
//! holding the id alongside a keyed check value, base64url-encoded. The same
//! id always yields the same token under the same secret, and any malformed
//! or tampered token fails decoding rather than decoding to a wrong id.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const BLOCK_SIZE: usize = 16;
const CHECK_SIZE: usize = 8;

/// Encodes and decodes external identifier tokens.
///
/// Construct one from the configured secret at startup and share it; encoding
/// and decoding take `&self` and are safe for unrestricted concurrent use.
#[derive(Clone)]
pub struct IdCodec {
    cipher: Aes128,
    check_key: [u8; 16],
}

impl IdCodec {
    /// Derives the cipher and check keys from the configured secret.
    ///
    /// An empty secret is a configuration error, not a usable key.
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::Config("identifier secret must not be empty".into()));
        }

        let digest = Sha256::digest(secret.as_bytes());
        let cipher = Aes128::new(GenericArray::from_slice(&digest[..16]));
        let mut check_key = [0u8; 16];
        check_key.copy_from_slice(&digest[16..32]);

        Ok(Self { cipher, check_key })
    }

    fn check(&self, id: i64) -> [u8; CHECK_SIZE] {
        let mut hasher = Sha256::new();
        hasher.update(self.check_key);
        hasher.update(id.to_be_bytes());
        let digest = hasher.finalize();

        let mut check = [0u8; CHECK_SIZE];
        check.copy_from_slice(&digest[..CHECK_SIZE]);
        check
    }

    /// Returns the external token for an internal identifier.
    #[must_use]
    pub fn encode(&self, id: i64) -> String {
        let mut block = [0u8; BLOCK_SIZE];
        block[..8].copy_from_slice(&id.to_be_bytes());
        block[8..].copy_from_slice(&self.check(id));

        let mut block = GenericArray::from(block);
        self.cipher.encrypt_block(&mut block);

        URL_SAFE_NO_PAD.encode(block)
    }

    /// Recovers the internal identifier from an external token.
    ///
    /// Fails with `Error::Codec` for anything that is not the untampered
    /// output of [`encode`](Self::encode) under the same secret.
    pub fn decode(&self, token: &str) -> Result<i64> {
        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| Error::Codec)?;
        if bytes.len() != BLOCK_SIZE {
            return Err(Error::Codec);
        }

        let mut block = GenericArray::clone_from_slice(&bytes);
        self.cipher.decrypt_block(&mut block);

        let id = i64::from_be_bytes(block[..8].try_into().map_err(|_| Error::Codec)?);
        if block[8..] != self.check(id) {
            return Err(Error::Codec);
        }

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> IdCodec {
        IdCodec::new("test-secret").unwrap()
    }

    #[test]
    fn test_round_trip() {
        let codec = codec();
        for id in [0, 1, 42, 7_000_000_000, i64::MAX, -1] {
            let token = codec.encode(id);
            assert_eq!(codec.decode(&token).unwrap(), id);
        }
    }

    #[test]
    fn test_deterministic() {
        let codec = codec();
        assert_eq!(codec.encode(99), codec.encode(99));
        assert_ne!(codec.encode(99), codec.encode(100));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(IdCodec::new(""), Err(Error::Config(_))));
    }

    #[test]
    fn test_mutated_token_fails() {
        let codec = codec();
        let token = codec.encode(42);

        for i in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let mutated = String::from_utf8(bytes).unwrap();
            if mutated == token {
                continue;
            }
            assert!(
                matches!(codec.decode(&mutated), Err(Error::Codec)),
                "mutation at {i} decoded"
            );
        }
    }

    #[test]
    fn test_truncated_token_fails() {
        let codec = codec();
        let token = codec.encode(42);

        for len in 0..token.len() {
            assert!(matches!(codec.decode(&token[..len]), Err(Error::Codec)));
        }
    }

    #[test]
    fn test_garbage_fails() {
        let codec = codec();
        assert!(matches!(codec.decode("not base64 at all!"), Err(Error::Codec)));
        assert!(matches!(codec.decode(""), Err(Error::Codec)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let token = IdCodec::new("secret-a").unwrap().encode(42);
        let other = IdCodec::new("secret-b").unwrap();
        assert!(matches!(other.decode(&token), Err(Error::Codec)));
    }
}
