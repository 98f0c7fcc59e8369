//! The host: one agent's chain plus its view of the network
//!
//! A [`Host`] owns the entry definition registry, the source chain (behind a
//! mutex, so appends are serialized), the local DHT view and the routing
//! table. All actions are dispatched through [`Host::call`]. Inbound network
//! messages arrive through the [`MessageHandler`] impl in `resolve.rs`.

mod bundle;
mod resolve;

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::action::{
    self, Action, ActionResult, BundleCancelHook, BundleCancelReason, BundleCancelResponse,
    ValidationContext, DEFAULT_BUNDLE_TIMEOUT,
};
use crate::api::ApiFn;
use crate::chain::{Chain, ChainStore};
use crate::config::{Config, NetworkConfig};
use crate::dht::Dht;
use crate::entry::{DelEntry, Entry, EntryDef, AGENT_ENTRY_TYPE, DEL_ENTRY_TYPE, DNA_ENTRY_TYPE};
use crate::error::{ChainError, Result};
use crate::hash::{Hash, HashSpec};
use crate::header::Header;
use crate::network::{
    DelReq, MemoryNetwork, Message, MessageHandler, MessageType, ModReq, PutReq, RoutingTable,
    Transport,
};
use crate::peer::PeerId;
use crate::registry::EntryDefRegistry;
use crate::signing::Agent;

/// How a committed entry reaches the DHT.
#[derive(Debug, Clone)]
enum Publication {
    Put,
    Mod { replaces: Hash },
    Del { target_type: String, del: DelEntry },
}

/// A committed entry waiting to be published.
#[derive(Debug, Clone)]
struct Pending {
    entry_type: String,
    entry: Entry,
    header: Header,
    publication: Publication,
}

pub struct Host {
    me: Weak<Host>,
    agent: Agent,
    node_id: PeerId,
    hash_spec: HashSpec,
    registry: EntryDefRegistry,
    chain: Mutex<Chain>,
    dht: Dht,
    routing: RoutingTable,
    transport: Option<Arc<dyn Transport>>,
    network: NetworkConfig,
    bundle_timeout: Duration,
    cancel_hook: Option<BundleCancelHook>,
}

pub struct HostBuilder {
    agent: Agent,
    registry: Option<EntryDefRegistry>,
    store: Option<Box<dyn ChainStore>>,
    hash_spec: HashSpec,
    network: NetworkConfig,
    bundle_timeout: Duration,
    cancel_hook: Option<BundleCancelHook>,
    transport: Option<Arc<dyn Transport>>,
    memory_network: Option<Arc<MemoryNetwork>>,
    dna: Option<Vec<u8>>,
}

impl HostBuilder {
    pub fn new(agent: Agent) -> Self {
        Self {
            agent,
            registry: None,
            store: None,
            hash_spec: HashSpec::default(),
            network: NetworkConfig::default(),
            bundle_timeout: DEFAULT_BUNDLE_TIMEOUT,
            cancel_hook: None,
            transport: None,
            memory_network: None,
            dna: None,
        }
    }

    /// Registry, hash function, network settings and bundle timeout from a
    /// loaded config. Schema files resolve against `base_dir`.
    pub fn from_config(agent: Agent, config: &Config, base_dir: &std::path::Path) -> Result<Self> {
        let registry = EntryDefRegistry::from_config(&config.entry_defs, base_dir)?;
        Ok(Self::new(agent)
            .registry(registry)
            .hash_spec(config.hash_spec()?)
            .network_config(config.network.clone())
            .bundle_timeout(config.bundle_timeout()))
    }

    pub fn registry(mut self, registry: EntryDefRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn store(mut self, store: Box<dyn ChainStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn hash_spec(mut self, spec: HashSpec) -> Self {
        self.hash_spec = spec;
        self
    }

    pub fn network_config(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    pub fn bundle_timeout(mut self, timeout: Duration) -> Self {
        self.bundle_timeout = timeout;
        self
    }

    /// Called when a bundle is closed without committing.
    pub fn on_bundle_cancel<F>(mut self, hook: F) -> Self
    where
        F: Fn(BundleCancelReason, &str) -> BundleCancelResponse + Send + Sync + 'static,
    {
        self.cancel_hook = Some(Arc::new(hook));
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Join an in-process network; the host registers itself on build.
    pub fn memory_network(mut self, network: Arc<MemoryNetwork>) -> Self {
        self.transport = Some(network.clone());
        self.memory_network = Some(network);
        self
    }

    /// Content of the DNA entry written at genesis.
    pub fn dna(mut self, dna: impl Into<Vec<u8>>) -> Self {
        self.dna = Some(dna.into());
        self
    }

    pub async fn build(self) -> Result<Arc<Host>> {
        let registry = match self.registry {
            Some(r) => r,
            None => EntryDefRegistry::system()?,
        };
        let mut chain = match self.store {
            Some(store) => Chain::new(store, self.hash_spec),
            None => Chain::in_memory(self.hash_spec),
        };

        if chain.length()? == 0 {
            let dna = self.dna.unwrap_or_else(|| {
                let mut names: Vec<&str> = registry.names().collect();
                names.sort_unstable();
                names.join(",").into_bytes()
            });
            genesis(&mut chain, &self.agent, dna)?;
        }

        let node_id = self.agent.node_id();
        let host = Arc::new_cyclic(|me| Host {
            me: me.clone(),
            routing: RoutingTable::new(node_id.clone()),
            node_id: node_id.clone(),
            agent: self.agent,
            hash_spec: self.hash_spec,
            registry,
            chain: Mutex::new(chain),
            dht: Dht::new(),
            transport: self.transport,
            network: self.network,
            bundle_timeout: self.bundle_timeout,
            cancel_hook: self.cancel_hook,
        });

        if let Some(net) = self.memory_network {
            let handler: Arc<dyn MessageHandler> = host.clone();
            net.register(node_id.clone(), Arc::downgrade(&handler)).await;
        }

        info!(node_id = %node_id, identity = host.agent.identity(), "Host started");
        Ok(host)
    }
}

/// Write the DNA and agent entries that open every chain.
fn genesis(chain: &mut Chain, agent: &Agent, dna: Vec<u8>) -> Result<()> {
    let dna_entry = Entry::bytes(dna);
    let header = chain.prepare_header(agent, DNA_ENTRY_TYPE, &dna_entry, None)?;
    chain.append_main(&header, &dna_entry)?;

    let agent_entry = Entry::text(agent.agent_entry(None)?.to_json()?);
    let header = chain.prepare_header(agent, AGENT_ENTRY_TYPE, &agent_entry, None)?;
    chain.append_main(&header, &agent_entry)?;

    info!(dna = %dna_entry.sum(&chain.hash_spec())?, "Chain genesis");
    Ok(())
}

impl Host {
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn node_id(&self) -> &PeerId {
        &self.node_id
    }

    pub fn hash_spec(&self) -> HashSpec {
        self.hash_spec
    }

    pub fn registry(&self) -> &EntryDefRegistry {
        &self.registry
    }

    pub fn dht(&self) -> &Dht {
        &self.dht
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Lock the chain. Do not hold the guard across calls into the host.
    pub async fn chain(&self) -> MutexGuard<'_, Chain> {
        self.chain.lock().await
    }

    pub fn add_peer(&self, peer: PeerId) {
        self.routing.add_peer(peer);
    }

    /// Look up the definition of an entry type.
    pub fn get_entry_def(&self, entry_type: &str) -> Result<Arc<EntryDef>> {
        self.registry.get(entry_type)
    }

    fn validation_context(&self) -> ValidationContext<'_> {
        ValidationContext {
            registry: &self.registry,
            hash_spec: self.hash_spec,
        }
    }

    /// Run the full validation pipeline for `action`.
    pub fn validate_action(
        &self,
        action: &Action,
        entry_type: &str,
        validation_base: Option<&Hash>,
        sources: &[PeerId],
    ) -> Result<Arc<EntryDef>> {
        action::validate_action(
            &self.validation_context(),
            action,
            entry_type,
            validation_base,
            sources,
        )
    }

    /// Dispatch an action.
    pub async fn call(&self, action: Action) -> Result<ActionResult> {
        debug!(action = action.name(), "Call");
        match action {
            Action::Commit(_) | Action::Mod(_) | Action::Del(_) => {
                self.commit_and_share(action).await.map(ActionResult::Hash)
            }
            Action::Put(a) => {
                let header = a.header.clone().ok_or_else(|| {
                    ChainError::ValidationFailed("put: missing header".into())
                })?;
                let req = PutReq {
                    entry_type: a.entry_type,
                    entry: a.entry,
                    header,
                    author: self.agent.encode_pub_key(),
                };
                self.receive_put(req, self.node_id.clone())
                    .await
                    .map(ActionResult::Hash)
            }
            Action::Get(a) => self.get(a.req, a.options).await.map(ActionResult::Get),
            Action::StartBundle(a) => {
                self.start_bundle(&a).await?;
                Ok(ActionResult::BundleStarted)
            }
            Action::CloseBundle(a) => {
                self.close_bundle(a.commit).await?;
                Ok(ActionResult::BundleClosed)
            }
            Action::Sign(a) => Ok(ActionResult::Signature(a.call(&self.agent))),
            Action::VerifySignature(a) => a.call().map(ActionResult::Verified),
        }
    }

    /// Call an API function by name with JSON arguments.
    pub async fn call_api(&self, name: &str, args: &[Value]) -> Result<Value> {
        let function = ApiFn::from_name(name)?;
        let action = function.parse_with(args, self.bundle_timeout)?;
        let result = self.call(action).await?;
        Ok(result.to_value())
    }

    /// Convenience for committing an application entry.
    pub async fn commit(&self, entry_type: &str, entry: Entry) -> Result<Hash> {
        self.commit_and_share(Action::Commit(action::CommitAction::new(entry_type, entry)))
            .await
    }

    /// Validate and append a commit, modify or delete action, then publish
    /// it when it landed on the main chain and its type is public. Returns
    /// the hash of the new entry.
    pub async fn commit_and_share(&self, mut action: Action) -> Result<Hash> {
        let (def, validation_type, entry, header, in_bundle) = {
            let mut chain = self.chain.lock().await;

            let validation_type = match &action {
                Action::Del(a) => chain
                    .find_entry(&a.del.hash)?
                    .map(|(_, h)| h.entry_type)
                    .ok_or(ChainError::HashNotFound)?,
                Action::Commit(_) | Action::Mod(_) => action.entry_type().to_string(),
                other => return Err(ChainError::UnknownFunction(other.name().to_string())),
            };

            if let Some(entry) = action.entry() {
                let header = chain.prepare_header(
                    &self.agent,
                    action.entry_type(),
                    entry,
                    action.change().cloned(),
                )?;
                action.set_header(header);
            }

            let def = self.validate_action(
                &action,
                &validation_type,
                None,
                std::slice::from_ref(&self.node_id),
            )?;

            let (Some(entry), Some(header)) = (action.entry().cloned(), action.header().cloned())
            else {
                return Err(ChainError::NilEntryInvalid);
            };
            chain.add_entry(&header, &entry)?;
            let in_bundle = chain.bundle_started().is_some();
            (def, validation_type, entry, header, in_bundle)
        };

        info!(
            action = action.name(),
            entry_type = action.entry_type(),
            hash = %header.entry_link,
            bundle = in_bundle,
            "Committed"
        );

        if !in_bundle && def.is_public() {
            let publication = match &action {
                Action::Mod(a) => Publication::Mod {
                    replaces: a.replaces.clone(),
                },
                Action::Del(a) => Publication::Del {
                    target_type: validation_type,
                    del: a.del.clone(),
                },
                _ => Publication::Put,
            };
            self.publish(Pending {
                entry_type: action.entry_type().to_string(),
                entry,
                header: header.clone(),
                publication,
            })
            .await?;
        }
        Ok(header.entry_link)
    }

    /// How a record already on the chain would be published, or `None`
    /// when its type is private.
    fn pending_for(&self, chain: &Chain, header: &Header, entry: &Entry) -> Result<Option<Pending>> {
        let (share_type, publication) = if header.entry_type == DEL_ENTRY_TYPE {
            let del = DelEntry::from_json(entry.as_str().unwrap_or_default())?;
            let Some((_, target)) = chain.find_entry(&del.hash)? else {
                warn!(hash = %del.hash, "Delete target not on chain, not publishing");
                return Ok(None);
            };
            (
                target.entry_type.clone(),
                Publication::Del {
                    target_type: target.entry_type,
                    del,
                },
            )
        } else {
            let publication = match &header.change {
                Some(replaces) => Publication::Mod {
                    replaces: replaces.clone(),
                },
                None => Publication::Put,
            };
            (header.entry_type.clone(), publication)
        };

        if !self.registry.get(&share_type)?.is_public() {
            return Ok(None);
        }
        Ok(Some(Pending {
            entry_type: header.entry_type.clone(),
            entry: entry.clone(),
            header: header.clone(),
            publication,
        }))
    }

    /// Store into the local DHT view, then send to the nearest peers
    /// without waiting for them.
    async fn publish(&self, pending: Pending) -> Result<()> {
        let hash = pending.header.entry_link.clone();
        let me = self.node_id.clone();

        self.dht
            .put(
                hash.clone(),
                &pending.entry_type,
                pending.entry.clone(),
                pending.header.clone(),
                me.clone(),
            )
            .await;

        let author = self.agent.encode_pub_key();
        let fanout = self.network.publish_fanout;
        let mut targets = self.routing.closest(&hash, fanout);
        let msg = match pending.publication {
            Publication::Put => Message::new(
                MessageType::PutRequest,
                me,
                &PutReq {
                    entry_type: pending.entry_type,
                    entry: pending.entry,
                    header: pending.header,
                    author,
                },
            )?,
            Publication::Mod { replaces } => {
                self.dht.modify(&replaces, &hash).await;
                targets.extend(self.routing.closest(&replaces, fanout));
                Message::new(
                    MessageType::ModRequest,
                    me,
                    &ModReq {
                        entry_type: pending.entry_type,
                        entry: pending.entry,
                        header: pending.header,
                        author,
                        replaces,
                    },
                )?
            }
            Publication::Del { target_type, del } => {
                self.dht.delete(&del.hash).await;
                targets.extend(self.routing.closest(&del.hash, fanout));
                Message::new(
                    MessageType::DelRequest,
                    me,
                    &DelReq {
                        entry_type: target_type,
                        del,
                        header: pending.header,
                        author,
                    },
                )?
            }
        };
        targets.sort();
        targets.dedup();

        let Some(transport) = self.transport.clone() else {
            return Ok(());
        };
        debug!(hash = %hash, msg_type = %msg.msg_type, peers = targets.len(), "Publishing");
        for peer in targets {
            let transport = transport.clone();
            let msg = msg.clone();
            tokio::spawn(async move {
                if let Err(e) = transport.send(&peer, msg).await {
                    warn!(peer = %peer, error = %e, "Publish failed");
                }
            });
        }
        Ok(())
    }
}
