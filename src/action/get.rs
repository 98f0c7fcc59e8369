use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::dht::{GetMask, StatusMask};
use crate::entry::{Content, Entry};
use crate::hash::Hash;
use crate::peer::PeerId;

/// What to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetReq {
    pub hash: Hash,
    #[serde(default)]
    pub status_mask: StatusMask,
    #[serde(default)]
    pub get_mask: GetMask,
}

impl GetReq {
    pub fn new(hash: Hash) -> Self {
        Self {
            hash,
            status_mask: StatusMask::default(),
            get_mask: GetMask::default(),
        }
    }

    pub fn with_get_mask(mut self, mask: GetMask) -> Self {
        self.get_mask = mask;
        self
    }

    pub fn with_status_mask(mut self, mask: StatusMask) -> Self {
        self.status_mask = mask;
        self
    }
}

/// Where to look.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Only consult the local chain
    pub local: bool,
    /// Search the open bundle's overlay before going further
    pub bundle: bool,
    /// Facets to return; overrides the request's own mask when set
    pub get_mask: Option<GetMask>,
}

impl GetOptions {
    pub fn local() -> Self {
        Self {
            local: true,
            ..Default::default()
        }
    }

    pub fn bundle() -> Self {
        Self {
            bundle: true,
            ..Default::default()
        }
    }

    /// The mask a get is answered with.
    pub fn effective_mask(&self, req: &GetReq) -> GetMask {
        self.get_mask.unwrap_or(req.get_mask)
    }
}

#[derive(Debug, Clone)]
pub struct GetAction {
    pub req: GetReq,
    pub options: GetOptions,
}

impl GetAction {
    pub fn new(req: GetReq, options: GetOptions) -> Self {
        Self { req, options }
    }
}

/// A direct answer to a get. Facets not selected by the get mask are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GetResp {
    pub entry: Option<Entry>,
    pub entry_type: Option<String>,
    pub sources: Option<Vec<PeerId>>,
}

impl GetResp {
    /// Project a found record onto the facets selected by `mask`.
    pub fn project(entry: Entry, entry_type: &str, sources: Vec<PeerId>, mask: GetMask) -> Self {
        Self {
            entry: mask.has(GetMask::ENTRY).then_some(entry),
            entry_type: mask
                .has(GetMask::ENTRY_TYPE)
                .then(|| entry_type.to_string()),
            sources: mask.has(GetMask::SOURCES).then_some(sources),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        if let Some(entry) = &self.entry {
            let content = match entry.content() {
                Content::Text(s) => json!(s),
                Content::Bytes(b) => json!(b),
            };
            out.insert("Entry".into(), content);
        }
        if let Some(t) = &self.entry_type {
            out.insert("EntryType".into(), json!(t));
        }
        if let Some(sources) = &self.sources {
            let ids: Vec<String> = sources.iter().map(|p| p.to_string()).collect();
            out.insert("Sources".into(), json!(ids));
        }
        Value::Object(out)
    }
}

/// Redirect to peers nearer the requested hash than the responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloserPeersResp {
    pub closer_peers: Vec<PeerId>,
}
