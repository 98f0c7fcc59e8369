use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Bundle lifetime used when a start request gives no timeout.
pub const DEFAULT_BUNDLE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Why a bundle is being closed without committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleCancelReason {
    UserCancel,
    Timeout,
}

impl fmt::Display for BundleCancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleCancelReason::UserCancel => f.write_str("userCancel"),
            BundleCancelReason::Timeout => f.write_str("timeout"),
        }
    }
}

/// Answer of the cancel hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleCancelResponse {
    Discard,
    ForceCommit,
}

/// Called with the cancel reason and the bundle's user parameter.
pub type BundleCancelHook =
    Arc<dyn Fn(BundleCancelReason, &str) -> BundleCancelResponse + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartBundleAction {
    pub timeout: Duration,
    pub user_param: String,
}

impl StartBundleAction {
    /// A zero timeout selects [`DEFAULT_BUNDLE_TIMEOUT`].
    pub fn new(timeout_ms: u64, user_param: impl Into<String>) -> Self {
        Self::with_default(timeout_ms, user_param, DEFAULT_BUNDLE_TIMEOUT)
    }

    /// A zero timeout selects `default`.
    pub fn with_default(timeout_ms: u64, user_param: impl Into<String>, default: Duration) -> Self {
        let timeout = if timeout_ms == 0 {
            default
        } else {
            Duration::from_millis(timeout_ms)
        };
        Self {
            timeout,
            user_param: user_param.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseBundleAction {
    pub commit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_bundle_timeout_default() {
        let a = StartBundleAction::new(0, "myBundle");
        assert_eq!(a.timeout, DEFAULT_BUNDLE_TIMEOUT);
        assert_eq!(a.user_param, "myBundle");
        assert_eq!(StartBundleAction::new(123, "myBundle").timeout, Duration::from_millis(123));
    }

    #[test]
    fn test_reason_names() {
        assert_eq!(BundleCancelReason::UserCancel.to_string(), "userCancel");
        assert_eq!(BundleCancelReason::Timeout.to_string(), "timeout");
    }
}
