//! Read-path resolution and inbound message handling

use std::collections::HashSet;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info};

use super::Host;
use crate::action::{
    Action, CloserPeersResp, DelAction, GetOptions, GetReq, GetResp, ModAction, PutAction,
};
use crate::entry::DEL_ENTRY_TYPE;
use crate::error::{ChainError, Result};
use crate::hash::Hash;
use crate::header::Header;
use crate::network::{DelReq, Message, MessageHandler, MessageType, ModReq, PutReq, Response};
use crate::peer::PeerId;
use crate::signing::{decode_pub_key, peer_id_for};

impl Host {
    /// Resolve a get: the local chain only when `options.local`, else the
    /// bundle overlay (when asked), this node's DHT view and finally the
    /// network.
    pub async fn get(&self, req: GetReq, options: GetOptions) -> Result<GetResp> {
        let mask = options.effective_mask(&req);
        {
            let chain = self.chain.lock().await;
            if options.local {
                let (entry, header) = chain
                    .get_entry(&req.hash)?
                    .ok_or(ChainError::HashNotFound)?;
                return Ok(GetResp::project(
                    entry,
                    &header.entry_type,
                    vec![self.node_id.clone()],
                    mask,
                ));
            }
            if options.bundle {
                if let Some((entry, header)) = chain.get_bundle_entry(&req.hash)? {
                    return Ok(GetResp::project(
                        entry,
                        &header.entry_type,
                        vec![self.node_id.clone()],
                        mask,
                    ));
                }
            }
            // private entries never leave the chain
            if let Some((_, header)) = chain.get_entry(&req.hash)? {
                let private = self
                    .registry
                    .get(&header.entry_type)
                    .map(|d| !d.is_public())
                    .unwrap_or(false);
                if private {
                    return Err(ChainError::HashNotFound);
                }
            }
        }

        match self.dht.get(&req.hash, req.status_mask).await {
            Ok(rec) => {
                return Ok(GetResp::project(rec.entry, &rec.entry_type, rec.sources, mask))
            }
            Err(ChainError::HashNotFound) => {}
            Err(e) => return Err(e),
        }

        // peers project the response with the mask they receive
        let req = req.with_get_mask(mask);
        self.network_get(&req).await
    }

    /// Iterative lookup: ask the nearest known peers, follow closer-peer
    /// redirects for up to `max_hops` rounds. Every send is bounded by the
    /// get timeout. Peers the transport cannot reach are forgotten.
    async fn network_get(&self, req: &GetReq) -> Result<GetResp> {
        let Some(transport) = self.transport.clone() else {
            return Err(ChainError::HashNotFound);
        };
        let k = self.network.closer_peer_count;
        let wait = self.network.get_timeout();

        let mut visited: HashSet<PeerId> = HashSet::from([self.node_id.clone()]);
        let mut frontier = self.routing.closest(&req.hash, k);

        for hop in 0..self.network.max_hops {
            frontier.retain(|p| visited.insert(p.clone()));
            if frontier.is_empty() {
                break;
            }
            debug!(hash = %req.hash, hop, peers = frontier.len(), "Network get");

            let mut sends = Vec::with_capacity(frontier.len());
            for peer in &frontier {
                let msg = Message::new(MessageType::GetRequest, self.node_id.clone(), req)?;
                let transport = transport.clone();
                let peer = peer.clone();
                sends.push(async move {
                    let reply = tokio::time::timeout(wait, transport.send(&peer, msg)).await;
                    (peer, reply)
                });
            }

            let mut next = Vec::new();
            for (peer, reply) in join_all(sends).await {
                let answer = match reply {
                    Err(_) => {
                        debug!(peer = %peer, "Get request timed out");
                        continue;
                    }
                    Ok(Err(ChainError::PeerUnreachable(_))) => {
                        debug!(peer = %peer, "Dropping unreachable peer");
                        self.routing.remove_peer(&peer);
                        continue;
                    }
                    Ok(answer) => answer,
                };
                // redirect targets only join the table once they answer
                self.routing.add_peer(peer.clone());
                match answer {
                    Ok(Response::Get(resp)) => {
                        debug!(hash = %req.hash, peer = %peer, hop, "Network get answered");
                        return Ok(resp);
                    }
                    Ok(Response::CloserPeers(c)) => next.extend(c.closer_peers),
                    Ok(Response::Ok) => {}
                    Err(e @ (ChainError::HashDeleted | ChainError::HashModified(_))) => {
                        return Err(e)
                    }
                    Err(e) => debug!(peer = %peer, error = %e, "Get request failed"),
                }
            }

            next.sort_by_key(|p| p.distance(&req.hash));
            next.dedup();
            next.truncate(k);
            frontier = next;
        }
        Err(ChainError::HashNotFound)
    }

    /// Answer an inbound message.
    pub async fn action_receiver(&self, msg: Message) -> Result<Response> {
        if msg.from != self.node_id {
            self.routing.add_peer(msg.from.clone());
        }
        debug!(msg_type = %msg.msg_type, from = %msg.from, "Message received");

        match msg.msg_type {
            MessageType::GetRequest => {
                let req: GetReq = msg.body()?;
                match self.dht.get(&req.hash, req.status_mask).await {
                    Ok(rec) => Ok(Response::Get(GetResp::project(
                        rec.entry,
                        &rec.entry_type,
                        rec.sources,
                        req.get_mask,
                    ))),
                    Err(ChainError::HashNotFound) => {
                        let closer = self.routing.closer_peers(
                            &req.hash,
                            &msg.from,
                            self.network.closer_peer_count,
                        );
                        if closer.is_empty() {
                            Err(ChainError::HashNotFound)
                        } else {
                            Ok(Response::CloserPeers(CloserPeersResp {
                                closer_peers: closer,
                            }))
                        }
                    }
                    Err(e) => Err(e),
                }
            }
            MessageType::PutRequest => {
                let req: PutReq = msg.body()?;
                self.receive_put(req, msg.from).await?;
                Ok(Response::Ok)
            }
            MessageType::ModRequest => {
                let req: ModReq = msg.body()?;
                self.receive_mod(req, msg.from).await?;
                Ok(Response::Ok)
            }
            MessageType::DelRequest => {
                let req: DelReq = msg.body()?;
                self.receive_del(req, msg.from).await?;
                Ok(Response::Ok)
            }
        }
    }

    /// Validate a published entry with its sender as source and store it.
    pub(super) async fn receive_put(&self, req: PutReq, from: PeerId) -> Result<Hash> {
        check_author(&req.header, &req.author, &from)?;
        let base = req.header.entry_link.clone();
        let action = Action::Put(PutAction::new(
            req.entry_type.clone(),
            req.entry.clone(),
            Some(req.header.clone()),
        ));
        let def = self.validate_action(&action, &req.entry_type, Some(&base), &[from.clone()])?;
        if !def.is_public() {
            return Err(ChainError::ValidationFailed(format!(
                "{} entries are private",
                def.name
            )));
        }
        self.dht
            .put(base.clone(), &req.entry_type, req.entry, req.header, from)
            .await;
        Ok(base)
    }

    async fn receive_mod(&self, req: ModReq, from: PeerId) -> Result<()> {
        check_author(&req.header, &req.author, &from)?;
        let new = req.header.entry_link.clone();
        let mut action = ModAction::new(
            req.entry_type.clone(),
            Some(req.entry.clone()),
            req.replaces.clone(),
        );
        action.header = Some(req.header.clone());
        self.validate_action(
            &Action::Mod(action),
            &req.entry_type,
            Some(&new),
            &[from.clone()],
        )?;
        self.dht
            .put(new.clone(), &req.entry_type, req.entry, req.header, from)
            .await;
        if !self.dht.modify(&req.replaces, &new).await {
            debug!(old = %req.replaces, "Modified entry not held here");
        }
        info!(old = %req.replaces, new = %new, "Modify received");
        Ok(())
    }

    async fn receive_del(&self, req: DelReq, from: PeerId) -> Result<()> {
        check_author(&req.header, &req.author, &from)?;
        let tombstone = req.header.entry_link.clone();
        let mut action = DelAction::new(req.del.clone())?;
        action.header = Some(req.header.clone());
        let entry = action.entry().clone();
        self.validate_action(
            &Action::Del(action),
            &req.entry_type,
            Some(&tombstone),
            &[from.clone()],
        )?;
        self.dht
            .put(tombstone, DEL_ENTRY_TYPE, entry, req.header, from)
            .await;
        if !self.dht.delete(&req.del.hash).await {
            debug!(hash = %req.del.hash, "Deleted entry not held here");
        }
        info!(hash = %req.del.hash, "Delete received");
        Ok(())
    }
}

/// A published header must be signed by the key of the peer sending it.
fn check_author(header: &Header, author: &str, from: &PeerId) -> Result<()> {
    let rejected = |msg: String| ChainError::ValidationFailed(msg);
    let key = decode_pub_key(author).map_err(|e| rejected(e.to_string()))?;
    if peer_id_for(&key) != *from {
        return Err(rejected(format!("header author is not sender {}", from)));
    }
    if !header.verify(author).map_err(|e| rejected(e.to_string()))? {
        return Err(rejected("header signature does not match".to_string()));
    }
    Ok(())
}

#[async_trait]
impl MessageHandler for Host {
    async fn handle(&self, msg: Message) -> Result<Response> {
        self.action_receiver(msg).await
    }
}
