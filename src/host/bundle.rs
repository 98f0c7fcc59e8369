//! Bundle transactions on the host
//!
//! Start arms an expiry task; close (explicit or by expiry) goes through
//! one path. A close without commit asks the cancel hook, which may force
//! the commit.

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Host, Pending};
use crate::chain::ChainStore;
use crate::action::{BundleCancelReason, BundleCancelResponse, StartBundleAction};
use crate::error::{ChainError, Result};

impl Host {
    /// Open a bundle. Fails if one is already open.
    pub async fn start_bundle(&self, action: &StartBundleAction) -> Result<Uuid> {
        let mut chain = self.chain.lock().await;
        let id = chain.start_bundle(action.timeout, &action.user_param)?;

        let me = self.me.clone();
        let timeout = action.timeout;
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(host) = me.upgrade() {
                host.expire_bundle(id).await;
            }
        });
        if let Some(bundle) = chain.bundle_mut() {
            bundle.arm_timer(task.abort_handle());
        }

        info!(
            bundle = %id,
            timeout_ms = timeout.as_millis() as u64,
            user_param = %action.user_param,
            "Bundle started"
        );
        Ok(id)
    }

    /// Close the open bundle, merging it into the chain when `commit` is
    /// true.
    pub async fn close_bundle(&self, commit: bool) -> Result<()> {
        self.finish_bundle(commit, BundleCancelReason::UserCancel, None)
            .await
    }

    async fn expire_bundle(&self, id: Uuid) {
        match self
            .finish_bundle(false, BundleCancelReason::Timeout, Some(id))
            .await
        {
            Ok(()) => {}
            Err(ChainError::BundleNotStarted) => debug!(bundle = %id, "Bundle already closed"),
            Err(e) => warn!(bundle = %id, error = %e, "Bundle expiry failed"),
        }
    }

    /// Shared close path. `id` is set when the expiry task closes the
    /// bundle, so a newer bundle is left alone.
    async fn finish_bundle(
        &self,
        commit: bool,
        reason: BundleCancelReason,
        id: Option<Uuid>,
    ) -> Result<()> {
        let pending = {
            let mut chain = self.chain.lock().await;
            let user_param = match (chain.bundle_started(), id) {
                (None, _) => return Err(ChainError::BundleNotStarted),
                (Some(b), Some(id)) if b.id != id => return Err(ChainError::BundleNotStarted),
                (Some(b), _) => b.user_param.clone(),
            };

            let commit = commit || self.ask_cancel_hook(reason, &user_param);

            let mut bundle = chain.take_bundle(id)?;
            if id.is_none() {
                bundle.disarm_timer();
            }

            let records = bundle.chain.entries()?;
            if !commit {
                info!(
                    bundle = %bundle.id,
                    reason = %reason,
                    discarded = records.len(),
                    "Bundle discarded"
                );
                return Ok(());
            }

            let mut pending: Vec<Pending> = Vec::with_capacity(records.len());
            for (header, entry) in &records {
                chain.append_main(header, entry)?;
            }
            for (header, entry) in &records {
                if let Some(p) = self.pending_for(&chain, header, entry)? {
                    pending.push(p);
                }
            }
            info!(
                bundle = %bundle.id,
                committed = records.len(),
                length = chain.length()?,
                "Bundle committed"
            );
            pending
        };

        for p in pending {
            self.publish(p).await?;
        }
        Ok(())
    }

    /// True when the hook vetoes the cancel.
    fn ask_cancel_hook(&self, reason: BundleCancelReason, user_param: &str) -> bool {
        let response = match &self.cancel_hook {
            Some(hook) => hook(reason, user_param),
            None => BundleCancelResponse::Discard,
        };
        debug!(reason = %reason, user_param, response = ?response, "Bundle cancel hook");
        if response == BundleCancelResponse::ForceCommit {
            info!(reason = %reason, user_param, "Bundle cancel vetoed, committing");
            return true;
        }
        false
    }
}
