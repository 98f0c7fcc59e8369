//! In-process transport
//!
//! Routes messages between handlers registered in the same process. Every
//! hop goes through the MessagePack wire encoding so the in-memory path
//! exercises the same codec a socket transport would.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{Message, MessageHandler, Reply, Response, Transport};
use crate::error::{ChainError, Result};
use crate::peer::PeerId;

#[derive(Default)]
pub struct MemoryNetwork {
    nodes: RwLock<HashMap<PeerId, Weak<dyn MessageHandler>>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn register(&self, id: PeerId, handler: Weak<dyn MessageHandler>) {
        debug!(peer = %id, "Node joined memory network");
        self.nodes.write().await.insert(id, handler);
    }

    pub async fn unregister(&self, id: &PeerId) {
        self.nodes.write().await.remove(id);
    }

    pub async fn node_ids(&self) -> Vec<PeerId> {
        self.nodes.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl Transport for MemoryNetwork {
    async fn send(&self, to: &PeerId, msg: Message) -> Result<Response> {
        let handler = {
            let nodes = self.nodes.read().await;
            nodes.get(to).and_then(Weak::upgrade)
        };
        let Some(handler) = handler else {
            warn!(peer = %to, "Send to unknown peer");
            return Err(ChainError::PeerUnreachable(to.clone()));
        };

        let msg = Message::decode(&msg.encode()?)?;
        let reply = Reply::from_result(handler.handle(msg).await);
        let wire = rmp_serde::to_vec(&reply)?;
        let reply: Reply = rmp_serde::from_slice(&wire)?;
        reply.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{CloserPeersResp, GetReq};
    use crate::hash::HashSpec;
    use crate::network::MessageType;

    struct Echo;

    #[async_trait]
    impl MessageHandler for Echo {
        async fn handle(&self, msg: Message) -> Result<Response> {
            let req: GetReq = msg.body()?;
            if req.hash.is_null() {
                return Err(ChainError::HashNotFound);
            }
            Ok(Response::CloserPeers(CloserPeersResp {
                closer_peers: vec![msg.from],
            }))
        }
    }

    #[tokio::test]
    async fn test_routes_to_registered_handler() {
        let net = MemoryNetwork::new();
        let spec = HashSpec::default();
        let a = PeerId::from_hash(spec.sum(b"a"));
        let b = PeerId::from_hash(spec.sum(b"b"));

        let handler: Arc<dyn MessageHandler> = Arc::new(Echo);
        net.register(b.clone(), Arc::downgrade(&handler)).await;

        let msg = Message::new(MessageType::GetRequest, a.clone(), &GetReq::new(spec.sum(b"x")))
            .unwrap();
        let resp = net.send(&b, msg).await.unwrap();
        assert_eq!(
            resp,
            Response::CloserPeers(CloserPeersResp {
                closer_peers: vec![a.clone()]
            })
        );

        let msg = Message::new(MessageType::GetRequest, a.clone(), &GetReq::new(crate::hash::Hash::null()))
            .unwrap();
        assert!(matches!(net.send(&b, msg).await, Err(ChainError::HashNotFound)));

        let msg = Message::new(MessageType::GetRequest, b.clone(), &GetReq::new(spec.sum(b"x")))
            .unwrap();
        assert!(matches!(net.send(&a, msg).await, Err(ChainError::PeerUnreachable(p)) if p == a));

        drop(handler);
        let msg = Message::new(MessageType::GetRequest, a, &GetReq::new(spec.sum(b"x"))).unwrap();
        assert!(matches!(net.send(&b, msg).await, Err(ChainError::PeerUnreachable(_))));
    }
}
