//! Peer identities

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::{Distance, Hash};

/// A node's identity on the network: the hash of its agent's public key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(Hash);

impl PeerId {
    pub fn from_hash(hash: Hash) -> Self {
        Self(hash)
    }

    pub fn as_hash(&self) -> &Hash {
        &self.0
    }

    pub fn distance(&self, target: &Hash) -> Distance {
        self.0.distance(target)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

impl FromStr for PeerId {
    type Err = crate::error::ChainError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self(Hash::from_b58(s)?))
    }
}
