//! Local view of the distributed hash table
//!
//! Each node stores the public entries published to it, keyed by entry hash,
//! together with a status that tracks later modify and delete markers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::entry::Entry;
use crate::error::{ChainError, Result};
use crate::hash::Hash;
use crate::header::Header;
use crate::peer::PeerId;

/// Lifecycle status of a published entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Live,
    Deleted,
    Modified,
}

/// Set of statuses a Get is willing to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMask(u8);

impl StatusMask {
    pub const LIVE: StatusMask = StatusMask(0x01);
    pub const DELETED: StatusMask = StatusMask(0x04);
    pub const MODIFIED: StatusMask = StatusMask(0x08);
    pub const ANY: StatusMask = StatusMask(0xff);

    pub fn from_bits(bits: u8) -> Self {
        if bits == 0 {
            Self::default()
        } else {
            Self(bits)
        }
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn allows(&self, status: EntryStatus) -> bool {
        let bit = match status {
            EntryStatus::Live => Self::LIVE.0,
            EntryStatus::Deleted => Self::DELETED.0,
            EntryStatus::Modified => Self::MODIFIED.0,
        };
        self.0 & bit != 0
    }
}

impl Default for StatusMask {
    fn default() -> Self {
        Self::LIVE
    }
}

/// Which facets of a record a Get response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMask(u8);

impl GetMask {
    pub const ENTRY: GetMask = GetMask(0x01);
    pub const ENTRY_TYPE: GetMask = GetMask(0x02);
    pub const SOURCES: GetMask = GetMask(0x04);
    pub const ALL: GetMask = GetMask(0xff);

    pub fn from_bits(bits: u8) -> Self {
        if bits == 0 {
            Self::default()
        } else {
            Self(bits)
        }
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn has(&self, other: GetMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for GetMask {
    fn default() -> Self {
        Self::ENTRY
    }
}

impl std::ops::BitOr for GetMask {
    type Output = GetMask;

    fn bitor(self, rhs: GetMask) -> GetMask {
        GetMask(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone)]
pub struct DhtRecord {
    pub entry: Entry,
    pub entry_type: String,
    pub header: Header,
    pub status: EntryStatus,
    pub sources: Vec<PeerId>,
    pub replaced_by: Option<Hash>,
}

#[derive(Default)]
pub struct Dht {
    records: RwLock<HashMap<Hash, DhtRecord>>,
}

impl Dht {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a published entry. Re-publishing adds the source and keeps the
    /// existing status.
    pub async fn put(
        &self,
        hash: Hash,
        entry_type: &str,
        entry: Entry,
        header: Header,
        source: PeerId,
    ) {
        let mut records = self.records.write().await;
        match records.get_mut(&hash) {
            Some(existing) => {
                if !existing.sources.contains(&source) {
                    existing.sources.push(source);
                }
            }
            None => {
                debug!(hash = %hash, entry_type, "DHT put");
                records.insert(
                    hash,
                    DhtRecord {
                        entry,
                        entry_type: entry_type.to_string(),
                        header,
                        status: EntryStatus::Live,
                        sources: vec![source],
                        replaced_by: None,
                    },
                );
            }
        }
    }

    /// Fetch a record, honouring the status mask.
    pub async fn get(&self, hash: &Hash, mask: StatusMask) -> Result<DhtRecord> {
        let records = self.records.read().await;
        let record = records.get(hash).ok_or(ChainError::HashNotFound)?;
        if mask.allows(record.status) {
            return Ok(record.clone());
        }
        match (record.status, &record.replaced_by) {
            (EntryStatus::Modified, Some(new)) => Err(ChainError::HashModified(new.clone())),
            (EntryStatus::Deleted, _) => Err(ChainError::HashDeleted),
            _ => Err(ChainError::HashNotFound),
        }
    }

    pub async fn contains(&self, hash: &Hash) -> bool {
        self.records.read().await.contains_key(hash)
    }

    /// Mark `old` as replaced by `new`. Returns false when `old` is unknown.
    pub async fn modify(&self, old: &Hash, new: &Hash) -> bool {
        let mut records = self.records.write().await;
        match records.get_mut(old) {
            Some(record) => {
                record.status = EntryStatus::Modified;
                record.replaced_by = Some(new.clone());
                debug!(old = %old, new = %new, "DHT modify");
                true
            }
            None => false,
        }
    }

    /// Mark `hash` deleted. Returns false when it is unknown.
    pub async fn delete(&self, hash: &Hash) -> bool {
        let mut records = self.records.write().await;
        match records.get_mut(hash) {
            Some(record) => {
                record.status = EntryStatus::Deleted;
                debug!(hash = %hash, "DHT delete");
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashSpec;
    use crate::signing::Agent;
    use chrono::Utc;

    fn record(agent: &Agent, content: &str) -> (Hash, Entry, Header) {
        let spec = HashSpec::default();
        let entry = Entry::text(content);
        let hash = entry.sum(&spec).unwrap();
        let header = Header::new(agent, Utc::now(), "oddNumbers", Hash::null(), hash.clone(), None);
        (hash, entry, header)
    }

    #[tokio::test]
    async fn test_put_get() {
        let dht = Dht::new();
        let agent = Agent::generate("zippy");
        let (hash, entry, header) = record(&agent, "3");

        assert!(matches!(
            dht.get(&hash, StatusMask::default()).await,
            Err(ChainError::HashNotFound)
        ));
        dht.put(hash.clone(), "oddNumbers", entry.clone(), header.clone(), agent.node_id())
            .await;
        dht.put(hash.clone(), "oddNumbers", entry.clone(), header, agent.node_id())
            .await;

        let rec = dht.get(&hash, StatusMask::default()).await.unwrap();
        assert_eq!(rec.entry, entry);
        assert_eq!(rec.status, EntryStatus::Live);
        assert_eq!(rec.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_status_masks() {
        let dht = Dht::new();
        let agent = Agent::generate("zippy");
        let (h1, e1, hd1) = record(&agent, "3");
        let (h2, e2, hd2) = record(&agent, "5");
        dht.put(h1.clone(), "oddNumbers", e1, hd1, agent.node_id()).await;
        dht.put(h2.clone(), "oddNumbers", e2, hd2, agent.node_id()).await;

        assert!(dht.modify(&h1, &h2).await);
        match dht.get(&h1, StatusMask::default()).await {
            Err(ChainError::HashModified(new)) => assert_eq!(new, h2),
            other => panic!("unexpected {:?}", other.map(|r| r.status)),
        }
        let rec = dht.get(&h1, StatusMask::MODIFIED).await.unwrap();
        assert_eq!(rec.replaced_by, Some(h2.clone()));

        assert!(dht.delete(&h2).await);
        assert!(matches!(
            dht.get(&h2, StatusMask::default()).await,
            Err(ChainError::HashDeleted)
        ));
        assert!(dht.get(&h2, StatusMask::ANY).await.is_ok());

        assert!(!dht.delete(&HashSpec::default().sum(b"nope")).await);
    }

    #[test]
    fn test_masks_default() {
        assert_eq!(GetMask::from_bits(0), GetMask::ENTRY);
        assert!(GetMask::ALL.has(GetMask::SOURCES));
        assert!((GetMask::ENTRY | GetMask::ENTRY_TYPE).has(GetMask::ENTRY_TYPE));
        assert!(!GetMask::ENTRY.has(GetMask::SOURCES));
        assert!(StatusMask::from_bits(0).allows(EntryStatus::Live));
        assert!(!StatusMask::LIVE.allows(EntryStatus::Deleted));
    }
}
