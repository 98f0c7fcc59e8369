//! Entries and entry-type definitions
//!
//! An entry is opaque content addressed by its hash. An entry definition
//! declares how entries of a type are encoded, who may see them, and what
//! validator (if any) checks their content.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::{Hash, HashSpec};
use crate::header::Header;
use crate::validate::Validator;

/// System entry type names. These are never schema-overridable.
pub const DNA_ENTRY_TYPE: &str = "%dna";
pub const AGENT_ENTRY_TYPE: &str = "%agent";
pub const KEY_ENTRY_TYPE: &str = "%key";
pub const HEADERS_ENTRY_TYPE: &str = "%header";
pub const DEL_ENTRY_TYPE: &str = "%del";

pub const SYS_ENTRY_TYPES: [&str; 5] = [
    DNA_ENTRY_TYPE,
    AGENT_ENTRY_TYPE,
    KEY_ENTRY_TYPE,
    HEADERS_ENTRY_TYPE,
    DEL_ENTRY_TYPE,
];

pub fn is_sys_entry_type(name: &str) -> bool {
    SYS_ENTRY_TYPES.contains(&name)
}

/// Raw entry content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
}

/// A chain entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    content: Content,
}

impl Default for Entry {
    fn default() -> Self {
        Self::text("")
    }
}

impl Entry {
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            content: Content::Text(s.into()),
        }
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Self {
            content: Content::Bytes(b.into()),
        }
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Content as text, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match &self.content {
            Content::Text(s) => Some(s),
            Content::Bytes(_) => None,
        }
    }

    /// Binary-native encoding (MessagePack).
    pub fn marshal(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(data)?)
    }

    /// Content hash of the entry.
    pub fn sum(&self, spec: &HashSpec) -> Result<Hash> {
        Ok(spec.sum(&self.marshal()?))
    }
}

/// How an entry type's content is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// Plain text, validated as a JSON string value
    String,
    /// JSON document
    Json,
    /// JSON `{Links: [...]}` document
    Links,
    /// Opaque bytes
    Binary,
}

/// Whether entries of a type are published to the DHT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sharing {
    Public,
    Private,
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataFormat::String => "string",
            DataFormat::Json => "json",
            DataFormat::Links => "links",
            DataFormat::Binary => "binary",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Sharing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sharing::Public => f.write_str("public"),
            Sharing::Private => f.write_str("private"),
        }
    }
}

/// Declared shape and policy of an entry type.
#[derive(Clone)]
pub struct EntryDef {
    pub name: String,
    pub data_format: DataFormat,
    pub sharing: Sharing,
    pub validator: Option<Arc<dyn Validator>>,
}

impl EntryDef {
    pub fn new(name: impl Into<String>, data_format: DataFormat, sharing: Sharing) -> Self {
        Self {
            name: name.into(),
            data_format,
            sharing,
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn is_sys(&self) -> bool {
        is_sys_entry_type(&self.name)
    }

    pub fn is_public(&self) -> bool {
        self.sharing == Sharing::Public
    }
}

impl fmt::Debug for EntryDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryDef")
            .field("name", &self.name)
            .field("data_format", &self.data_format)
            .field("sharing", &self.sharing)
            .field("validator", &self.validator.as_ref().map(|v| v.name().to_string()))
            .finish()
    }
}

impl fmt::Display for EntryDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.data_format, self.sharing)
    }
}

/// Content of an agent entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentEntry {
    pub identity: String,
    #[serde(default)]
    pub revocation: String,
    #[serde(default)]
    pub public_key: String,
}

impl AgentEntry {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(j: &str) -> Result<Self> {
        Ok(serde_json::from_str(j)?)
    }
}

/// Tombstone pointing at a previously committed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DelEntry {
    pub hash: Hash,
    #[serde(default)]
    pub message: String,
}

impl DelEntry {
    pub fn new(hash: Hash, message: impl Into<String>) -> Self {
        Self {
            hash,
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(j: &str) -> Result<Self> {
        Ok(serde_json::from_str(j)?)
    }
}

/// One link of a links entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Link {
    pub base: String,
    pub link: String,
    pub tag: String,
}

/// Content of a links entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LinksEntry {
    #[serde(default)]
    pub links: Vec<Link>,
}

impl LinksEntry {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One record of a headers entry: a header shared by a source in some role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HeaderRecord {
    pub header: Header,
    pub role: String,
    pub source: String,
}
