//! Error types for elohim-chain

use thiserror::Error;

use crate::hash::Hash;
use crate::peer::PeerId;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, ChainError>;

#[derive(Error, Debug)]
pub enum ChainError {
    // Definition errors
    #[error("no definition for entry type: {0}")]
    EntryTypeMissing(String),

    #[error("invalid entry def")]
    EntryDefInvalid,

    // Structural validation
    #[error("Validation Failed: {0}")]
    ValidationFailed(String),

    #[error("invalid links entry: {0}")]
    InvalidLinks(String),

    #[error("invalid links entry, invalid json: {0}")]
    InvalidLinksJson(serde_json::Error),

    // System rules
    #[error("invalid action for DNA type")]
    NotValidForDNAType,

    #[error("invalid action for Headers type")]
    NotValidForHeadersType,

    #[error("mod: invalid for Links entry")]
    ModInvalidForLinks,

    #[error("del: invalid for Links entry")]
    DelInvalidForLinks,

    #[error("nil entry invalid")]
    NilEntryInvalid,

    #[error("mod: missing header")]
    ModMissingHeader,

    #[error("mod: replaces must be different from original hash")]
    ModReplacesHashNotDifferent,

    // Lookup
    #[error("hash not found")]
    HashNotFound,

    #[error("hash deleted")]
    HashDeleted,

    #[error("hash modified, replaced by {0}")]
    HashModified(Hash),

    // Calls
    #[error("wrong number of arguments")]
    WrongNargs,

    #[error("argument {name} should be {expected}")]
    WrongArgType { name: String, expected: String },

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    // Bundles
    #[error("bundle already started")]
    BundleAlreadyStarted,

    #[error("bundle not started")]
    BundleNotStarted,

    // Encodings and collaborators
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("signature error: {0}")]
    Signature(String),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("peer unreachable: {0}")]
    PeerUnreachable(PeerId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChainError {
    /// True for failures of an entry's structure or content, as opposed to
    /// rule violations, lookups or infrastructure errors.
    pub fn is_validation_failed(&self) -> bool {
        matches!(
            self,
            ChainError::ValidationFailed(_)
                | ChainError::InvalidLinks(_)
                | ChainError::InvalidLinksJson(_)
        )
    }
}

impl From<rmp_serde::encode::Error> for ChainError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        ChainError::Codec(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for ChainError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        ChainError::Codec(e.to_string())
    }
}
