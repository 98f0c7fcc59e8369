//! Chain headers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::{Hash, HashSpec};
use crate::signing::{verify_signature, Agent};

/// A chain record linking an entry to its predecessor header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Header {
    #[serde(rename = "Type")]
    pub entry_type: String,
    pub time: DateTime<Utc>,
    /// Hash of the previous header (null hash for the first header)
    pub header_link: Hash,
    /// Hash of the entry this header commits
    pub entry_link: Hash,
    /// For modify and delete actions, the hash being replaced
    #[serde(default)]
    pub change: Option<Hash>,
    /// Base58 signature of the entry hash by the chain owner
    pub sig: String,
}

impl Header {
    /// Build and sign a header for `entry_link`.
    pub fn new(
        agent: &Agent,
        time: DateTime<Utc>,
        entry_type: &str,
        prev: Hash,
        entry_link: Hash,
        change: Option<Hash>,
    ) -> Self {
        let sig = agent.sign_b58(entry_link.as_bytes());
        Self {
            entry_type: entry_type.to_string(),
            time,
            header_link: prev,
            entry_link,
            change,
            sig,
        }
    }

    pub fn sum(&self, spec: &HashSpec) -> Result<Hash> {
        Ok(spec.sum(&rmp_serde::to_vec(self)?))
    }

    /// Check the header signature against a base58 public key.
    pub fn verify(&self, b58_pub_key: &str) -> Result<bool> {
        verify_signature(&self.sig, self.entry_link.as_bytes(), b58_pub_key)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(j: &str) -> Result<Self> {
        Ok(serde_json::from_str(j)?)
    }
}
