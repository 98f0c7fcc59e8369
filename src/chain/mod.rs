//! The agent's source chain
//!
//! A [`Chain`] wraps a persistence engine ([`ChainStore`]) and, while a
//! bundle transaction is open, an in-memory overlay that receives every
//! append instead of the main store. Callers serialize access by holding the
//! chain behind a mutex; header linkage is always computed from the tail the
//! next append will land on.

mod bundle;
mod memory;
mod sqlite;

pub use bundle::Bundle;
pub use memory::MemoryChainStore;
pub use sqlite::SqliteChainStore;

use std::time::Duration;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::entry::Entry;
use crate::error::{ChainError, Result};
use crate::hash::{Hash, HashSpec};
use crate::header::Header;
use crate::signing::Agent;

/// Append-only persistence of headers and their entries.
pub trait ChainStore: Send {
    /// Append a header and its entry; returns the header hash.
    fn append(&mut self, header: &Header, entry: &Entry) -> Result<Hash>;

    /// The most recently appended header.
    fn top(&self) -> Result<Option<Header>>;

    /// Hash of the most recently appended header.
    fn top_hash(&self) -> Result<Option<Hash>>;

    fn length(&self) -> Result<usize>;

    /// Look up an entry (and the header that committed it) by entry hash.
    fn get(&self, entry_hash: &Hash) -> Result<Option<(Entry, Header)>>;

    /// All records in append order.
    fn entries(&self) -> Result<Vec<(Header, Entry)>>;
}

pub struct Chain {
    spec: HashSpec,
    store: Box<dyn ChainStore>,
    bundle: Option<Bundle>,
}

impl Chain {
    pub fn new(store: Box<dyn ChainStore>, spec: HashSpec) -> Self {
        Self {
            spec,
            store,
            bundle: None,
        }
    }

    /// A chain backed by an in-memory store.
    pub fn in_memory(spec: HashSpec) -> Self {
        Self::new(Box::new(MemoryChainStore::new(spec)), spec)
    }

    pub fn hash_spec(&self) -> HashSpec {
        self.spec
    }

    /// Length of the main chain. Overlay records are not counted.
    pub fn length(&self) -> Result<usize> {
        self.store.length()
    }

    pub fn top(&self) -> Result<Option<Header>> {
        self.store.top()
    }

    /// Hash of the header the next append links to.
    pub fn tail_hash(&self) -> Result<Hash> {
        if let Some(bundle) = &self.bundle {
            if let Some(h) = bundle.chain.top_hash()? {
                return Ok(h);
            }
        }
        Ok(self.store.top_hash()?.unwrap_or_else(Hash::null))
    }

    /// Build a signed header for `entry` linked to the current tail.
    pub fn prepare_header(
        &self,
        agent: &Agent,
        entry_type: &str,
        entry: &Entry,
        change: Option<Hash>,
    ) -> Result<Header> {
        let entry_hash = entry.sum(&self.spec)?;
        let prev = self.tail_hash()?;
        Ok(Header::new(agent, Utc::now(), entry_type, prev, entry_hash, change))
    }

    /// Append to the overlay when a bundle is open, to the main store
    /// otherwise. Returns the header hash.
    pub fn add_entry(&mut self, header: &Header, entry: &Entry) -> Result<Hash> {
        match &mut self.bundle {
            Some(bundle) => {
                let hash = bundle.chain.append(header, entry)?;
                debug!(entry = %header.entry_link, bundle = %bundle.id, "Appended to bundle");
                Ok(hash)
            }
            None => self.store.append(header, entry),
        }
    }

    /// Append straight to the main store, bypassing any open bundle.
    pub(crate) fn append_main(&mut self, header: &Header, entry: &Entry) -> Result<Hash> {
        self.store.append(header, entry)
    }

    /// Look up an entry on the main chain.
    pub fn get_entry(&self, entry_hash: &Hash) -> Result<Option<(Entry, Header)>> {
        self.store.get(entry_hash)
    }

    /// Look up an entry in the open bundle's overlay.
    pub fn get_bundle_entry(&self, entry_hash: &Hash) -> Result<Option<(Entry, Header)>> {
        match &self.bundle {
            Some(bundle) => bundle.chain.get(entry_hash),
            None => Ok(None),
        }
    }

    /// Overlay first, then the main chain.
    pub fn find_entry(&self, entry_hash: &Hash) -> Result<Option<(Entry, Header)>> {
        match self.get_bundle_entry(entry_hash)? {
            Some(found) => Ok(Some(found)),
            None => self.get_entry(entry_hash),
        }
    }

    pub fn entries(&self) -> Result<Vec<(Header, Entry)>> {
        self.store.entries()
    }

    pub fn bundle_started(&self) -> Option<&Bundle> {
        self.bundle.as_ref()
    }

    pub(crate) fn bundle_mut(&mut self) -> Option<&mut Bundle> {
        self.bundle.as_mut()
    }

    /// Open a bundle at the current main chain length.
    pub fn start_bundle(&mut self, timeout: Duration, user_param: &str) -> Result<Uuid> {
        if self.bundle.is_some() {
            return Err(ChainError::BundleAlreadyStarted);
        }
        let bundle = Bundle::new(self.store.length()?, timeout, user_param, self.spec);
        let id = bundle.id;
        self.bundle = Some(bundle);
        Ok(id)
    }

    /// Detach the open bundle. When `id` is given, only a bundle with that
    /// id is taken.
    pub fn take_bundle(&mut self, id: Option<Uuid>) -> Result<Bundle> {
        match (&self.bundle, id) {
            (None, _) => Err(ChainError::BundleNotStarted),
            (Some(b), Some(id)) if b.id != id => Err(ChainError::BundleNotStarted),
            _ => self.bundle.take().ok_or(ChainError::BundleNotStarted),
        }
    }
}
