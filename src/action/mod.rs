//! Actions: typed intents submitted to a host
//!
//! Every state change or query goes through an [`Action`]. Mutating actions
//! carry enough state to be validated by [`validate_action`] and, once a
//! header has been prepared for them, to be appended to the chain. The host
//! dispatches on the variant (see `Host::call`).

mod bundle;
mod commit;
mod get;
mod sign;

pub use bundle::{
    BundleCancelHook, BundleCancelReason, BundleCancelResponse, CloseBundleAction,
    StartBundleAction, DEFAULT_BUNDLE_TIMEOUT,
};
pub use commit::{CommitAction, DelAction, ModAction, PutAction};
pub use get::{CloserPeersResp, GetAction, GetOptions, GetReq, GetResp};
pub use sign::{SignAction, VerifySignatureAction};

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::entry::{Entry, EntryDef};
use crate::error::{ChainError, Result};
use crate::hash::{Hash, HashSpec};
use crate::header::Header;
use crate::peer::PeerId;
use crate::registry::EntryDefRegistry;
use crate::validate::validate_entry_content;

/// Read-only state validation runs against.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub registry: &'a EntryDefRegistry,
    pub hash_spec: HashSpec,
}

#[derive(Debug, Clone)]
pub enum Action {
    Commit(CommitAction),
    Put(PutAction),
    Mod(ModAction),
    Del(DelAction),
    Get(GetAction),
    StartBundle(StartBundleAction),
    CloseBundle(CloseBundleAction),
    Sign(SignAction),
    VerifySignature(VerifySignatureAction),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Commit(_) => "commit",
            Action::Put(_) => "put",
            Action::Mod(_) => "mod",
            Action::Del(_) => "del",
            Action::Get(_) => "get",
            Action::StartBundle(_) => "startBundle",
            Action::CloseBundle(_) => "closeBundle",
            Action::Sign(_) => "sign",
            Action::VerifySignature(_) => "verifySignature",
        }
    }

    /// Entry type the action's header is committed under. Empty for actions
    /// that never reach the chain.
    pub fn entry_type(&self) -> &str {
        match self {
            Action::Commit(a) => &a.entry_type,
            Action::Put(a) => &a.entry_type,
            Action::Mod(a) => &a.entry_type,
            Action::Del(_) => crate::entry::DEL_ENTRY_TYPE,
            _ => "",
        }
    }

    pub fn entry(&self) -> Option<&Entry> {
        match self {
            Action::Commit(a) => Some(&a.entry),
            Action::Put(a) => Some(&a.entry),
            Action::Mod(a) => a.entry.as_ref(),
            Action::Del(a) => Some(a.entry()),
            _ => None,
        }
    }

    pub fn header(&self) -> Option<&Header> {
        match self {
            Action::Commit(a) => a.header.as_ref(),
            Action::Put(a) => a.header.as_ref(),
            Action::Mod(a) => a.header.as_ref(),
            Action::Del(a) => a.header.as_ref(),
            _ => None,
        }
    }

    pub fn set_header(&mut self, header: Header) {
        match self {
            Action::Commit(a) => a.header = Some(header),
            Action::Put(a) => a.header = Some(header),
            Action::Mod(a) => a.header = Some(header),
            Action::Del(a) => a.header = Some(header),
            _ => {}
        }
    }

    /// Hash being replaced, for modify and delete actions.
    pub fn change(&self) -> Option<&Hash> {
        match self {
            Action::Mod(a) => Some(&a.replaces),
            Action::Del(a) => Some(&a.del.hash),
            _ => None,
        }
    }

    /// Fixed structural rules for this action against `def`.
    pub fn sys_validation(
        &self,
        ctx: &ValidationContext<'_>,
        def: &EntryDef,
        validation_base: Option<&Hash>,
        sources: &[PeerId],
    ) -> Result<()> {
        debug!(
            action = self.name(),
            entry_type = %def.name,
            sources = sources.len(),
            "System validation"
        );
        match self {
            Action::Commit(a) => a.sys_validation(ctx, def, validation_base),
            Action::Put(a) => a.sys_validation(ctx, def, validation_base),
            Action::Mod(a) => a.sys_validation(ctx, def, validation_base),
            Action::Del(a) => a.sys_validation(ctx, def, validation_base),
            _ => Ok(()),
        }
    }
}

/// Validate an action against the definition of `entry_type`.
///
/// For delete actions `entry_type` is the type of the entry being deleted.
/// `sources` are the peers the entry came from: the local node for
/// self-originated actions, the sender for actions received from the
/// network.
pub fn validate_action(
    ctx: &ValidationContext<'_>,
    action: &Action,
    entry_type: &str,
    validation_base: Option<&Hash>,
    sources: &[PeerId],
) -> Result<Arc<EntryDef>> {
    let def = ctx.registry.get(entry_type)?;

    action
        .sys_validation(ctx, &def, validation_base, sources)
        .inspect_err(|e| debug!(action = action.name(), entry_type, error = %e, "Action rejected"))?;

    if !def.is_sys() && !matches!(action, Action::Del(_)) {
        if let Some(entry) = action.entry() {
            validate_entry_content(&def, entry).inspect_err(
                |e| debug!(action = action.name(), entry_type, error = %e, "Validation failed"),
            )?;
        }
    }
    Ok(def)
}

/// Check that an entry hashes to the expected validation base.
pub(crate) fn check_validation_base(
    ctx: &ValidationContext<'_>,
    entry: &Entry,
    validation_base: Option<&Hash>,
) -> Result<()> {
    if let Some(base) = validation_base {
        let hash = entry.sum(&ctx.hash_spec)?;
        if &hash != base {
            return Err(ChainError::ValidationFailed(format!(
                "entry hash {} does not match {}",
                hash, base
            )));
        }
    }
    Ok(())
}

/// Outcome of a dispatched action.
#[derive(Debug, Clone)]
pub enum ActionResult {
    /// Entry hash of a committed or published entry
    Hash(Hash),
    Get(GetResp),
    Signature(String),
    Verified(bool),
    BundleStarted,
    BundleClosed,
}

impl ActionResult {
    /// JSON rendering returned from API calls.
    pub fn to_value(&self) -> Value {
        match self {
            ActionResult::Hash(h) => json!(h.to_b58()),
            ActionResult::Get(resp) => resp.to_value(),
            ActionResult::Signature(s) => json!(s),
            ActionResult::Verified(b) => json!(b),
            ActionResult::BundleStarted | ActionResult::BundleClosed => Value::Null,
        }
    }

    pub fn into_hash(self) -> Result<Hash> {
        match self {
            ActionResult::Hash(h) => Ok(h),
            other => Err(ChainError::Codec(format!("expected hash result, got {:?}", other))),
        }
    }

    pub fn into_get(self) -> Result<GetResp> {
        match self {
            ActionResult::Get(r) => Ok(r),
            other => Err(ChainError::Codec(format!("expected get result, got {:?}", other))),
        }
    }
}
