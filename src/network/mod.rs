//! Peer messaging
//!
//! Messages and replies travel MessagePack encoded. The [`Transport`]
//! contract delivers a message to a peer and returns its reply; a node
//! answers inbound messages through [`MessageHandler`].

mod memory;
mod routing;

pub use memory::MemoryNetwork;
pub use routing::RoutingTable;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::action::{CloserPeersResp, GetResp};
use crate::entry::{DelEntry, Entry};
use crate::error::{ChainError, Result};
use crate::hash::Hash;
use crate::header::Header;
use crate::peer::PeerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "GET_REQUEST")]
    GetRequest,
    #[serde(rename = "PUT_REQUEST")]
    PutRequest,
    #[serde(rename = "MOD_REQUEST")]
    ModRequest,
    #[serde(rename = "DEL_REQUEST")]
    DelRequest,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageType::GetRequest => "GET_REQUEST",
            MessageType::PutRequest => "PUT_REQUEST",
            MessageType::ModRequest => "MOD_REQUEST",
            MessageType::DelRequest => "DEL_REQUEST",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub msg_type: MessageType,
    pub from: PeerId,
    pub time: DateTime<Utc>,
    body: Vec<u8>,
}

impl Message {
    pub fn new<T: Serialize>(msg_type: MessageType, from: PeerId, body: &T) -> Result<Self> {
        Ok(Self {
            msg_type,
            from,
            time: Utc::now(),
            body: rmp_serde::to_vec(body)?,
        })
    }

    /// Decode the body as the type its message tag implies.
    pub fn body<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(rmp_serde::from_slice(&self.body)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(data)?)
    }
}

/// Body of a `PUT_REQUEST`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutReq {
    pub entry_type: String,
    pub entry: Entry,
    pub header: Header,
    /// Base58 public key that signed the header
    pub author: String,
}

/// Body of a `MOD_REQUEST`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModReq {
    pub entry_type: String,
    pub entry: Entry,
    pub header: Header,
    /// Base58 public key that signed the header
    pub author: String,
    pub replaces: Hash,
}

/// Body of a `DEL_REQUEST`. `entry_type` is the type of the deleted entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelReq {
    pub entry_type: String,
    pub del: DelEntry,
    pub header: Header,
    /// Base58 public key that signed the header
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Get(GetResp),
    CloserPeers(CloserPeersResp),
    Ok,
}

/// Wire form of a handler outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum Reply {
    Ok(Response),
    NotFound,
    Deleted,
    Modified(Hash),
    Failed(String),
}

impl Reply {
    fn from_result(result: Result<Response>) -> Self {
        match result {
            Ok(r) => Reply::Ok(r),
            Err(ChainError::HashNotFound) => Reply::NotFound,
            Err(ChainError::HashDeleted) => Reply::Deleted,
            Err(ChainError::HashModified(h)) => Reply::Modified(h),
            Err(e) => Reply::Failed(e.to_string()),
        }
    }

    fn into_result(self) -> Result<Response> {
        match self {
            Reply::Ok(r) => Ok(r),
            Reply::NotFound => Err(ChainError::HashNotFound),
            Reply::Deleted => Err(ChainError::HashDeleted),
            Reply::Modified(h) => Err(ChainError::HashModified(h)),
            Reply::Failed(msg) => Err(ChainError::Network(msg)),
        }
    }
}

/// Delivers messages to peers.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, to: &PeerId, msg: Message) -> Result<Response>;
}

/// Answers inbound messages.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, msg: Message) -> Result<Response>;
}
