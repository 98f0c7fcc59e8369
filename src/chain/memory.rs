use std::collections::HashMap;

use super::ChainStore;
use crate::entry::Entry;
use crate::error::Result;
use crate::hash::{Hash, HashSpec};
use crate::header::Header;

/// Chain store kept entirely in memory. Also used as the bundle overlay.
#[derive(Debug, Clone)]
pub struct MemoryChainStore {
    spec: HashSpec,
    records: Vec<(Header, Entry)>,
    header_hashes: Vec<Hash>,
    by_entry: HashMap<Hash, usize>,
}

impl MemoryChainStore {
    pub fn new(spec: HashSpec) -> Self {
        Self {
            spec,
            records: Vec::new(),
            header_hashes: Vec::new(),
            by_entry: HashMap::new(),
        }
    }
}

impl ChainStore for MemoryChainStore {
    fn append(&mut self, header: &Header, entry: &Entry) -> Result<Hash> {
        let hash = header.sum(&self.spec)?;
        // first commit of an entry wins
        self.by_entry
            .entry(header.entry_link.clone())
            .or_insert(self.records.len());
        self.records.push((header.clone(), entry.clone()));
        self.header_hashes.push(hash.clone());
        Ok(hash)
    }

    fn top(&self) -> Result<Option<Header>> {
        Ok(self.records.last().map(|(h, _)| h.clone()))
    }

    fn top_hash(&self) -> Result<Option<Hash>> {
        Ok(self.header_hashes.last().cloned())
    }

    fn length(&self) -> Result<usize> {
        Ok(self.records.len())
    }

    fn get(&self, entry_hash: &Hash) -> Result<Option<(Entry, Header)>> {
        Ok(self
            .by_entry
            .get(entry_hash)
            .and_then(|i| self.records.get(*i))
            .map(|(h, e)| (e.clone(), h.clone())))
    }

    fn entries(&self) -> Result<Vec<(Header, Entry)>> {
        Ok(self.records.clone())
    }
}
