//! Content hashes
//!
//! Hashes are multihashes (`<fn code><digest len><digest>`) rendered as
//! base58 text. Entries, headers and peer identities all share this
//! representation so that routing distance can be computed between any two
//! of them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256, Sha512};

use crate::error::{ChainError, Result};

/// Multihash function code for SHA2-256
pub const SHA2_256: u8 = 0x12;

/// Multihash function code for SHA2-512
pub const SHA2_512: u8 = 0x13;

/// Which hash function (and digest length) a chain uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashSpec {
    pub code: u8,
    pub length: usize,
}

impl Default for HashSpec {
    fn default() -> Self {
        Self {
            code: SHA2_256,
            length: 32,
        }
    }
}

impl HashSpec {
    pub fn sha2_512() -> Self {
        Self {
            code: SHA2_512,
            length: 64,
        }
    }

    /// Parse a hash function name as used in configuration files.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "sha2-256" => Ok(Self::default()),
            "sha2-512" => Ok(Self::sha2_512()),
            other => Err(ChainError::Config(format!(
                "unsupported hash function: {}",
                other
            ))),
        }
    }

    /// Hash arbitrary bytes.
    pub fn sum(&self, data: &[u8]) -> Hash {
        let digest: Vec<u8> = match self.code {
            SHA2_512 => Sha512::digest(data).to_vec(),
            _ => Sha256::digest(data).to_vec(),
        };
        let mut bytes = Vec::with_capacity(digest.len() + 2);
        bytes.push(self.code);
        bytes.push(digest.len() as u8);
        bytes.extend_from_slice(&digest);
        Hash(bytes)
    }
}

/// A multihash.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(Vec<u8>);

impl Hash {
    /// Wrap raw multihash bytes, checking the framing.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() <= 3 {
            return Err(ChainError::InvalidHash(
                "multihash too short. must be > 3 bytes".into(),
            ));
        }
        if bytes[1] as usize != bytes.len() - 2 {
            return Err(ChainError::InvalidHash(
                "input isn't valid multihash".into(),
            ));
        }
        Ok(Hash(bytes))
    }

    /// Decode a base58 rendered multihash.
    pub fn from_b58(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| ChainError::InvalidHash("input isn't valid multihash".into()))?;
        Self::from_bytes(bytes)
    }

    /// The all-zero hash used as the predecessor of a chain's first header.
    pub fn null() -> Self {
        let spec = HashSpec::default();
        let mut bytes = vec![spec.code, spec.length as u8];
        bytes.extend(std::iter::repeat(0u8).take(spec.length));
        Hash(bytes)
    }

    pub fn is_null(&self) -> bool {
        self.digest().iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The digest without the multihash prefix.
    pub fn digest(&self) -> &[u8] {
        &self.0[2..]
    }

    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    /// XOR distance between two hashes, over their digests.
    pub fn distance(&self, other: &Hash) -> Distance {
        let mut out = [0u8; 32];
        let a = self.digest();
        let b = other.digest();
        for (i, slot) in out.iter_mut().enumerate() {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            *slot = x ^ y;
        }
        Distance(out)
    }
}

/// Kademlia-style XOR distance. Smaller is closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Distance(pub [u8; 32]);

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_b58())
    }
}

impl FromStr for Hash {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        Hash::from_b58(s)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_b58())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_b58(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_is_deterministic_multihash() {
        let spec = HashSpec::default();
        let a = spec.sum(b"some data");
        let b = spec.sum(b"some data");
        assert_eq!(a, b);
        assert_eq!(a.as_bytes()[0], SHA2_256);
        assert_eq!(a.as_bytes()[1], 32);
        assert!(a.to_b58().starts_with("Qm"));
    }

    #[test]
    fn test_parse_known_hash() {
        let h = Hash::from_b58("QmY8Mzg9F69e5P9AoQPYat655HEhc1TVGs11tmfNSzkqh2").unwrap();
        assert_eq!(h.to_string(), "QmY8Mzg9F69e5P9AoQPYat655HEhc1TVGs11tmfNSzkqh2");
    }

    #[test]
    fn test_parse_rejects_short_and_garbled() {
        let err = Hash::from_b58("x").unwrap_err();
        assert_eq!(err.to_string(), "invalid hash: multihash too short. must be > 3 bytes");

        let err = Hash::from_b58("not-a-hash").unwrap_err();
        assert_eq!(err.to_string(), "invalid hash: input isn't valid multihash");
    }

    #[test]
    fn test_sha2_512_spec() {
        let h = HashSpec::sha2_512().sum(b"x");
        assert_eq!(h.digest().len(), 64);
        assert_eq!(Hash::from_b58(&h.to_b58()).unwrap(), h);
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let h = HashSpec::default().sum(b"a");
        assert_eq!(h.distance(&h), Distance([0u8; 32]));
        let other = HashSpec::default().sum(b"b");
        assert!(h.distance(&other) > Distance([0u8; 32]));
    }

    #[test]
    fn test_null_hash() {
        assert!(Hash::null().is_null());
        assert!(!HashSpec::default().sum(b"").is_null());
    }
}
