//! Bundle transaction integration tests
//!
//! Covers the open → committed/discarded lifecycle, the cancel hook and
//! its force-commit veto, and expiry by timeout.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use elohim_chain::action::{
    Action, BundleCancelReason, BundleCancelResponse, CloseBundleAction, GetOptions, GetReq,
    StartBundleAction, DEFAULT_BUNDLE_TIMEOUT,
};
use elohim_chain::chain::ChainStore;
use elohim_chain::dht::StatusMask;
use elohim_chain::entry::Entry;
use elohim_chain::hash::HashSpec;
use elohim_chain::signing::Agent;
use elohim_chain::{ChainError, Host, HostBuilder};

type Calls = Arc<Mutex<Vec<(BundleCancelReason, String)>>>;

async fn host_with_hook(response: BundleCancelResponse) -> (Arc<Host>, Calls) {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let seen = calls.clone();
    let host = HostBuilder::new(Agent::generate("zippy@someemail.com"))
        .registry(common::registry())
        .on_bundle_cancel(move |reason, param| {
            seen.lock().unwrap().push((reason, param.to_string()));
            response
        })
        .build()
        .await
        .unwrap();
    (host, calls)
}

async fn start(host: &Host, timeout_ms: u64, param: &str) {
    host.call(Action::StartBundle(StartBundleAction::new(timeout_ms, param)))
        .await
        .unwrap();
}

async fn close(host: &Host, commit: bool) {
    host.call(Action::CloseBundle(CloseBundleAction { commit }))
        .await
        .unwrap();
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_bundle_discard_leaves_chain_untouched() {
    let (host, calls) = host_with_hook(BundleCancelResponse::Discard).await;
    let before = host.chain().await.length().unwrap();
    assert_eq!(before, 2);

    start(&host, 0, "myparam").await;
    {
        let chain = host.chain().await;
        let bundle = chain.bundle_started().unwrap();
        assert_eq!(bundle.start_len, before);
        assert_eq!(bundle.timeout, DEFAULT_BUNDLE_TIMEOUT);
    }

    let h2 = host.commit("evenNumbers", Entry::text("2")).await.unwrap();
    let h4 = host.commit("evenNumbers", Entry::text("4")).await.unwrap();
    assert_eq!(host.chain().await.length().unwrap(), before);
    assert!(host.dht().is_empty().await);

    // only a bundle-scoped get sees staged entries
    let err = host
        .get(GetReq::new(h2.clone()), GetOptions::local())
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::HashNotFound));
    let resp = host
        .get(GetReq::new(h2.clone()), GetOptions::bundle())
        .await
        .unwrap();
    assert_eq!(resp.entry, Some(Entry::text("2")));

    close(&host, false).await;

    assert!(host.chain().await.bundle_started().is_none());
    assert_eq!(host.chain().await.length().unwrap(), before);
    assert!(host
        .get(GetReq::new(h4), GetOptions::bundle())
        .await
        .is_err());
    assert_eq!(
        calls.lock().unwrap().clone(),
        vec![(BundleCancelReason::UserCancel, "myparam".to_string())]
    );
    assert_eq!(BundleCancelReason::UserCancel.to_string(), "userCancel");
}

#[tokio::test]
async fn test_bundle_commit_appends_and_publishes() {
    let (host, calls) = host_with_hook(BundleCancelResponse::Discard).await;
    let before = host.chain().await.length().unwrap();

    start(&host, 0, "").await;
    let mut hashes = Vec::new();
    for n in ["2", "4", "6"] {
        hashes.push(host.commit("evenNumbers", Entry::text(n)).await.unwrap());
    }
    close(&host, true).await;

    assert!(calls.lock().unwrap().is_empty());
    let chain = host.chain().await;
    assert_eq!(chain.length().unwrap(), before + 3);

    // linkage runs unbroken from genesis through the merged records
    let spec = HashSpec::default();
    let records = chain.entries().unwrap();
    for pair in records.windows(2) {
        assert_eq!(pair[1].0.header_link, pair[0].0.sum(&spec).unwrap());
    }
    drop(chain);

    for hash in &hashes {
        let record = host.dht().get(hash, StatusMask::default()).await.unwrap();
        assert_eq!(record.entry_type, "evenNumbers");
        assert_eq!(&record.sources, &[host.node_id().clone()]);
    }
}

#[tokio::test]
async fn test_cancel_hook_can_force_commit() {
    let (host, calls) = host_with_hook(BundleCancelResponse::ForceCommit).await;
    let before = host.chain().await.length().unwrap();

    start(&host, 0, "keep").await;
    let h = host.commit("oddNumbers", Entry::text("3")).await.unwrap();
    close(&host, false).await;

    assert_eq!(host.chain().await.length().unwrap(), before + 1);
    assert!(host.dht().contains(&h).await);
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_only_one_bundle_at_a_time() {
    let host = common::host().await;

    let err = host
        .call(Action::CloseBundle(CloseBundleAction { commit: true }))
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::BundleNotStarted));

    start(&host, 0, "").await;
    let err = host
        .call(Action::StartBundle(StartBundleAction::new(0, "")))
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::BundleAlreadyStarted));

    close(&host, true).await;
    start(&host, 0, "").await;
    close(&host, false).await;
}

#[tokio::test]
async fn test_invalid_commit_in_bundle_is_not_staged() {
    let host = common::host().await;
    start(&host, 0, "").await;

    assert!(host.commit("evenNumbers", Entry::text("5")).await.is_err());
    host.commit("evenNumbers", Entry::text("8")).await.unwrap();
    {
        let chain = host.chain().await;
        let bundle = chain.bundle_started().unwrap();
        assert_eq!(bundle.chain.entries().unwrap().len(), 1);
    }
    close(&host, true).await;
}

// =============================================================================
// Expiry
// =============================================================================

#[tokio::test]
async fn test_bundle_expires_after_timeout() {
    let (host, calls) = host_with_hook(BundleCancelResponse::Discard).await;
    let before = host.chain().await.length().unwrap();

    start(&host, 50, "slow").await;
    host.commit("evenNumbers", Entry::text("2")).await.unwrap();

    let expired = common::eventually(Duration::from_secs(2), || {
        let host = host.clone();
        async move {
            let closed = host.chain().await.bundle_started().is_none();
            closed
        }
    })
    .await;
    assert!(expired, "bundle should expire");

    assert_eq!(host.chain().await.length().unwrap(), before);
    assert_eq!(
        calls.lock().unwrap().clone(),
        vec![(BundleCancelReason::Timeout, "slow".to_string())]
    );

    // a new bundle can be opened afterwards
    start(&host, 0, "").await;
    close(&host, false).await;
}

#[tokio::test]
async fn test_explicit_close_disarms_timer() {
    let (host, calls) = host_with_hook(BundleCancelResponse::Discard).await;

    start(&host, 50, "first").await;
    close(&host, true).await;
    start(&host, 0, "second").await;

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(host.chain().await.bundle_started().is_some());
    assert!(calls.lock().unwrap().is_empty());
    close(&host, true).await;
}

// =============================================================================
// API calls
// =============================================================================

#[tokio::test]
async fn test_bundle_through_api() {
    let host = common::host().await;
    let before = host.chain().await.length().unwrap();

    host.call_api("bundleStart", &[json!(0), json!("fromApi")])
        .await
        .unwrap();
    let hash = host
        .call_api("commit", &[json!("evenNumbers"), json!("10")])
        .await
        .unwrap();
    assert_eq!(hash, json!(common::sum(&Entry::text("10")).to_b58()));

    let resp = host
        .call_api("get", &[hash.clone(), json!({"Bundle": true, "GetMask": 3})])
        .await
        .unwrap();
    assert_eq!(resp, json!({"Entry": "10", "EntryType": "evenNumbers"}));

    host.call_api("bundleClose", &[json!(true)]).await.unwrap();
    assert_eq!(host.chain().await.length().unwrap(), before + 1);

    let err = host.call_api("bundleClose", &[]).await.unwrap_err();
    assert!(matches!(err, ChainError::WrongNargs));
}
