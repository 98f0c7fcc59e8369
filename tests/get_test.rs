//! Read path and signing tests on a single host

mod common;

use serde_json::json;

use elohim_chain::action::{
    Action, DelAction, GetOptions, GetReq, ModAction, SignAction, VerifySignatureAction,
};
use elohim_chain::dht::{GetMask, StatusMask};
use elohim_chain::entry::{DelEntry, Entry};
use elohim_chain::signing::Agent;
use elohim_chain::ChainError;

use common::sum;

// =============================================================================
// Local resolution
// =============================================================================

#[tokio::test]
async fn test_local_get_of_committed_entry() {
    let host = common::host().await;
    let hash = host.commit("evenNumbers", Entry::text("2")).await.unwrap();

    let resp = host
        .get(GetReq::new(hash.clone()), GetOptions::local())
        .await
        .unwrap();
    assert_eq!(resp.entry, Some(Entry::text("2")));
    assert!(resp.entry_type.is_none());

    let req = GetReq::new(hash).with_get_mask(GetMask::ALL);
    let resp = host.get(req, GetOptions::local()).await.unwrap();
    assert_eq!(resp.entry_type.as_deref(), Some("evenNumbers"));
    assert_eq!(resp.sources, Some(vec![host.node_id().clone()]));
}

#[tokio::test]
async fn test_missing_hash_not_found() {
    let host = common::host().await;
    let hash = sum(&Entry::text("never committed"));

    for options in [GetOptions::local(), GetOptions::bundle(), GetOptions::default()] {
        let err = host
            .get(GetReq::new(hash.clone()), options)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::HashNotFound));
    }
}

#[tokio::test]
async fn test_private_entries_stay_local() {
    let host = common::host().await;
    let hash = host.commit("secret", Entry::text("31337")).await.unwrap();

    assert!(!host.dht().contains(&hash).await);
    let resp = host
        .get(GetReq::new(hash.clone()), GetOptions::local())
        .await
        .unwrap();
    assert_eq!(resp.entry, Some(Entry::text("31337")));

    let err = host
        .get(GetReq::new(hash), GetOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "hash not found");
}

#[tokio::test]
async fn test_public_entries_resolve_from_dht() {
    let host = common::host().await;
    let hash = host.commit("oddNumbers", Entry::text("7")).await.unwrap();

    let req = GetReq::new(hash).with_get_mask(GetMask::ENTRY | GetMask::SOURCES);
    let resp = host.get(req, GetOptions::default()).await.unwrap();
    assert_eq!(resp.entry, Some(Entry::text("7")));
    assert!(resp.entry_type.is_none());
    assert_eq!(resp.sources, Some(vec![host.node_id().clone()]));
}

#[tokio::test]
async fn test_mask_can_leave_out_entry_body() {
    let host = common::host().await;
    let hash = host.commit("evenNumbers", Entry::text("2")).await.unwrap();
    let type_only = GetReq::new(hash.clone()).with_get_mask(GetMask::ENTRY_TYPE);

    for options in [GetOptions::local(), GetOptions::default()] {
        let resp = host.get(type_only.clone(), options).await.unwrap();
        assert_eq!(resp.entry, None);
        assert_eq!(resp.entry_type.as_deref(), Some("evenNumbers"));
        assert_eq!(resp.sources, None);
    }

    // a mask on the options replaces the request's
    let options = GetOptions {
        get_mask: Some(GetMask::SOURCES),
        ..GetOptions::default()
    };
    let resp = host.get(type_only, options).await.unwrap();
    assert_eq!(resp.entry, None);
    assert_eq!(resp.entry_type, None);
    assert_eq!(resp.sources, Some(vec![host.node_id().clone()]));
}

// =============================================================================
// Entry status
// =============================================================================

#[tokio::test]
async fn test_modified_and_deleted_status() {
    let host = common::host().await;
    let old = host.commit("evenNumbers", Entry::text("2")).await.unwrap();
    let new = host
        .call(Action::Mod(ModAction::new(
            "evenNumbers",
            Some(Entry::text("4")),
            old.clone(),
        )))
        .await
        .unwrap()
        .into_hash()
        .unwrap();

    let err = host
        .get(GetReq::new(old.clone()), GetOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::HashModified(ref h) if *h == new));

    let req = GetReq::new(old.clone()).with_status_mask(StatusMask::ANY);
    let resp = host.get(req, GetOptions::default()).await.unwrap();
    assert_eq!(resp.entry, Some(Entry::text("2")));

    host.call(Action::Del(
        DelAction::new(DelEntry::new(new.clone(), "bye")).unwrap(),
    ))
    .await
    .unwrap();
    let err = host
        .get(GetReq::new(new.clone()), GetOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::HashDeleted));

    // the chain itself is append-only
    let resp = host
        .get(GetReq::new(new), GetOptions::local())
        .await
        .unwrap();
    assert_eq!(resp.entry, Some(Entry::text("4")));
}

// =============================================================================
// Signing
// =============================================================================

#[tokio::test]
async fn test_sign_and_verify_actions() {
    let host = common::host().await;
    let data = b"3".to_vec();

    let sig = SignAction::new(data.clone()).call(host.agent());
    assert_eq!(sig, host.agent().sign_b58(&data));

    let pub_key = host.agent().encode_pub_key();
    let ok = VerifySignatureAction::new(sig.clone(), data, pub_key.clone())
        .call()
        .unwrap();
    assert!(ok);

    let altered = VerifySignatureAction::new(sig.clone(), b"4".to_vec(), pub_key)
        .call()
        .unwrap();
    assert!(!altered);

    let stranger = Agent::generate("someone else").encode_pub_key();
    assert!(!VerifySignatureAction::new(sig, b"3".to_vec(), stranger)
        .call()
        .unwrap());
}

#[tokio::test]
async fn test_sign_and_verify_through_api() {
    let host = common::host().await;
    let pub_key = host.agent().encode_pub_key();

    let sig = host.call_api("sign", &[json!("3")]).await.unwrap();
    let verified = host
        .call_api("verifySignature", &[sig.clone(), json!("3"), json!(pub_key)])
        .await
        .unwrap();
    assert_eq!(verified, json!(true));

    let verified = host
        .call_api("verifySignature", &[sig, json!("4"), json!(pub_key)])
        .await
        .unwrap();
    assert_eq!(verified, json!(false));

    let err = host
        .call_api("verifySignature", &[json!("0OIl"), json!("3"), json!(pub_key)])
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::Signature(_)));
}
