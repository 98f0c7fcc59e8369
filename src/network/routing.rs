use std::collections::BTreeSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use crate::hash::Hash;
use crate::peer::PeerId;

/// Known peers, ordered by XOR distance when queried.
#[derive(Debug)]
pub struct RoutingTable {
    me: PeerId,
    peers: RwLock<BTreeSet<PeerId>>,
}

impl RoutingTable {
    pub fn new(me: PeerId) -> Self {
        Self {
            me,
            peers: RwLock::new(BTreeSet::new()),
        }
    }

    // Every write is a single insert or remove, so a poisoned set is whole.
    fn read(&self) -> RwLockReadGuard<'_, BTreeSet<PeerId>> {
        self.peers.read().unwrap_or_else(|poisoned| {
            warn!("Routing table lock poisoned");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeSet<PeerId>> {
        self.peers.write().unwrap_or_else(|poisoned| {
            warn!("Routing table lock poisoned");
            poisoned.into_inner()
        })
    }

    pub fn add_peer(&self, peer: PeerId) {
        if peer == self.me {
            return;
        }
        self.write().insert(peer);
    }

    pub fn remove_peer(&self, peer: &PeerId) {
        self.write().remove(peer);
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `k` known peers nearest `target`.
    pub fn closest(&self, target: &Hash, k: usize) -> Vec<PeerId> {
        let mut peers = self.peers();
        peers.sort_by_key(|p| p.distance(target));
        peers.truncate(k);
        peers
    }

    /// Up to `k` known peers strictly nearer `target` than this node,
    /// leaving out `excluding` (usually the requester).
    pub fn closer_peers(&self, target: &Hash, excluding: &PeerId, k: usize) -> Vec<PeerId> {
        let mine = self.me.distance(target);
        let mut peers: Vec<PeerId> = self
            .peers()
            .into_iter()
            .filter(|p| p != excluding && p.distance(target) < mine)
            .collect();
        peers.sort_by_key(|p| p.distance(target));
        peers.truncate(k);
        peers
    }
}
