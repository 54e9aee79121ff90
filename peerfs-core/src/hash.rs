use crate::error::{PeerfsError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

pub const CONTENT_HASH_LEN: usize = 32;

/// SHA-256 digest of a file's bytes. Rendered as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; CONTENT_HASH_LEN]);

impl ContentHash {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.len() != CONTENT_HASH_LEN * 2 {
            return Err(PeerfsError::InvalidHash(format!(
                "expected {} hex characters, got {}",
                CONTENT_HASH_LEN * 2,
                trimmed.len()
            )));
        }

        let mut bytes = [0u8; CONTENT_HASH_LEN];
        hex::decode_to_slice(trimmed, &mut bytes)
            .map_err(|error| PeerfsError::InvalidHash(format!("{}: {}", trimmed, error)))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Compute SHA256 hash of data
pub fn compute_hash(data: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    ContentHash(hasher.finalize().into())
}

/// Verify that data matches the expected hash
pub fn verify_hash(data: &[u8], expected: &ContentHash) -> Result<()> {
    let actual = compute_hash(data);
    if &actual != expected {
        return Err(PeerfsError::HashMismatch {
            expected: expected.to_hex(),
            actual: actual.to_hex(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_compute_hash_known_value() {
        let hash = compute_hash(b"hello");
        assert_eq!(hash.to_hex(), HELLO_SHA256);
        assert_eq!(hash.to_string().len(), 64);
    }

    #[test]
    fn test_parse_accepts_uppercase() {
        let hash = ContentHash::parse(&HELLO_SHA256.to_uppercase()).unwrap();
        assert_eq!(hash, compute_hash(b"hello"));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            ContentHash::parse("abc"),
            Err(PeerfsError::InvalidHash(_))
        ));
        let not_hex = "z".repeat(64);
        assert!(matches!(
            ContentHash::parse(&not_hex),
            Err(PeerfsError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_verify_hash() {
        let hash = compute_hash(b"hello");
        assert!(verify_hash(b"hello", &hash).is_ok());
        assert!(matches!(
            verify_hash(b"world", &hash),
            Err(PeerfsError::HashMismatch { .. })
        ));
    }
}
