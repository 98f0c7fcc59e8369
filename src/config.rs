//! Node configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entry::{DataFormat, Sharing};
use crate::error::{ChainError, Result};
use crate::hash::HashSpec;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    /// Application entry types
    #[serde(default)]
    pub entry_defs: Vec<EntryDefConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Agent identity string recorded in the agent entry
    #[serde(default = "default_identity")]
    pub identity: String,

    /// Data directory (chain database and agent key)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            identity: default_identity(),
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Hash function for entries and headers ("sha2-256" or "sha2-512")
    #[serde(default = "default_hash_function")]
    pub hash_function: String,

    /// Bundle timeout when a start request gives none, in milliseconds
    #[serde(default = "default_bundle_timeout")]
    pub bundle_timeout_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            hash_function: default_hash_function(),
            bundle_timeout_ms: default_bundle_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Per-peer wait for a get reply, in milliseconds
    #[serde(default = "default_get_timeout")]
    pub get_timeout_ms: u64,

    /// Rounds of closer-peer redirection before giving up
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,

    /// Peers returned in a closer-peers reply and queried per round
    #[serde(default = "default_closer_peers")]
    pub closer_peer_count: usize,

    /// Peers each published entry is sent to
    #[serde(default = "default_publish_fanout")]
    pub publish_fanout: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            get_timeout_ms: default_get_timeout(),
            max_hops: default_max_hops(),
            closer_peer_count: default_closer_peers(),
            publish_fanout: default_publish_fanout(),
        }
    }
}

impl NetworkConfig {
    pub fn get_timeout(&self) -> Duration {
        Duration::from_millis(self.get_timeout_ms)
    }
}

/// One `[[entry_defs]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDefConfig {
    pub name: String,
    pub data_format: DataFormat,
    #[serde(default = "default_sharing")]
    pub sharing: Sharing,
    /// JSON schema file, relative to the config file
    #[serde(default)]
    pub schema_file: Option<PathBuf>,
    /// Inline JSON schema text
    #[serde(default)]
    pub schema: Option<String>,
}

// Defaults
fn default_identity() -> String { "anonymous".to_string() }
fn default_data_dir() -> PathBuf { PathBuf::from("./data") }
fn default_hash_function() -> String { "sha2-256".to_string() }
fn default_bundle_timeout() -> u64 { 5000 }
fn default_get_timeout() -> u64 { 2000 }
fn default_max_hops() -> usize { 4 }
fn default_closer_peers() -> usize { 3 }
fn default_publish_fanout() -> usize { 3 }
fn default_sharing() -> Sharing { Sharing::Public }

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ChainError::Config(e.to_string()))
    }

    /// Load a config file, or defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn hash_spec(&self) -> Result<HashSpec> {
        HashSpec::from_name(&self.chain.hash_function)
    }

    pub fn bundle_timeout(&self) -> Duration {
        Duration::from_millis(self.chain.bundle_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.node.identity, "anonymous");
        assert_eq!(config.chain.bundle_timeout_ms, 5000);
        assert_eq!(config.network.max_hops, 4);
        assert!(config.entry_defs.is_empty());
        assert_eq!(config.hash_spec().unwrap(), HashSpec::default());
    }

    #[test]
    fn test_entry_defs_parse() {
        let config = Config::from_toml(
            r#"
[node]
identity = "zippy@someemail.com"

[chain]
hash_function = "sha2-512"

[[entry_defs]]
name = "evenNumbers"
data_format = "string"

[[entry_defs]]
name = "secret"
data_format = "string"
sharing = "private"

[[entry_defs]]
name = "profile"
data_format = "json"
schema_file = "schema_profile.json"
"#,
        )
        .unwrap();
        assert_eq!(config.entry_defs.len(), 3);
        assert_eq!(config.entry_defs[0].sharing, Sharing::Public);
        assert_eq!(config.entry_defs[1].sharing, Sharing::Private);
        assert_eq!(config.entry_defs[2].data_format, DataFormat::Json);
        assert_eq!(config.hash_spec().unwrap(), HashSpec::sha2_512());
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(Config::from_toml("[[entry_defs]]\nname = \"x\"\ndata_format = \"yaml\"").is_err());
        let config = Config::from_toml("[chain]\nhash_function = \"md5\"").unwrap();
        assert!(config.hash_spec().is_err());
    }
}
