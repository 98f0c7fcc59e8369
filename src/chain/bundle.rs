use std::time::Duration;

use tokio::task::AbortHandle;
use uuid::Uuid;

use super::MemoryChainStore;
use crate::hash::HashSpec;

/// An open bundle transaction: an overlay chain staged on top of the main
/// chain until it is committed or discarded.
pub struct Bundle {
    pub id: Uuid,
    /// Main chain length when the bundle was opened
    pub start_len: usize,
    pub timeout: Duration,
    pub user_param: String,
    pub chain: MemoryChainStore,
    timer: Option<AbortHandle>,
}

impl Bundle {
    pub(crate) fn new(start_len: usize, timeout: Duration, user_param: &str, spec: HashSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_len,
            timeout,
            user_param: user_param.to_string(),
            chain: MemoryChainStore::new(spec),
            timer: None,
        }
    }

    pub(crate) fn arm_timer(&mut self, handle: AbortHandle) {
        self.timer = Some(handle);
    }

    /// Cancel the expiry task, if one is armed.
    pub(crate) fn disarm_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl std::fmt::Debug for Bundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundle")
            .field("id", &self.id)
            .field("start_len", &self.start_len)
            .field("timeout", &self.timeout)
            .field("user_param", &self.user_param)
            .field("armed", &self.timer.is_some())
            .finish()
    }
}
