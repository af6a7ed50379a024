//! Property-based tests for the credential file.
//!
//! Load then save must reproduce the document, and refreshes must never drop
//! keys the sidecar does not model.

mod common;

use common::{at, credential_document, session};
use proptest::prelude::*;
use serde_json::{Map, Value};
use signer_sidecar::storage::{CredentialCodec, SessionCredential, TokenStore};

const TYPED_KEYS: &[&str] = &[
    "org_id",
    "role_id",
    "token",
    "refresh_token",
    "expiration",
    "purpose",
    "session_info",
];

const SESSION_INFO_KEYS: &[&str] = &[
    "auth_token",
    "auth_token_exp",
    "epoch",
    "epoch_token",
    "refresh_token",
    "refresh_token_exp",
    "session_id",
];

/// Generate arbitrary JSON leaf values.
fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 #:/._-]{0,24}".prop_map(Value::from),
    ]
}

/// Generate arbitrary nested JSON values.
fn arb_value() -> impl Strategy<Value = Value> {
    arb_leaf().prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-zA-Z_]{1,10}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Generate extra keys that do not collide with the `typed` ones.
fn arb_extra_fields(typed: &'static [&'static str]) -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-zA-Z_]{1,12}", arb_value(), 0..6).prop_map(move |m| {
        m.into_iter()
            .filter(|(k, _)| !typed.contains(&k.as_str()))
            .collect()
    })
}

fn document_with(extra: &Map<String, Value>, nested: &Map<String, Value>) -> Value {
    let mut document = credential_document();
    let root = document.as_object_mut().unwrap();
    for (k, v) in extra {
        root.insert(k.clone(), v.clone());
    }
    let session_info = root
        .get_mut("session_info")
        .and_then(Value::as_object_mut)
        .unwrap();
    for (k, v) in nested {
        session_info.insert(k.clone(), v.clone());
    }
    document
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Save(Load(doc)) yields the same key/value set as doc.
    #[test]
    fn prop_round_trip_preserves_document(
        extra in arb_extra_fields(TYPED_KEYS),
        nested in arb_extra_fields(SESSION_INFO_KEYS),
    ) {
        let document = document_with(&extra, &nested);
        let bytes = serde_json::to_vec(&document).unwrap();

        let credential = CredentialCodec::decode(&bytes).unwrap();
        let saved: Value = serde_json::from_slice(&CredentialCodec::encode(&credential).unwrap()).unwrap();

        prop_assert_eq!(saved, document);
    }

    /// Repeated refreshes keep unknown keys and take the new typed values.
    #[test]
    fn prop_refresh_cycles_keep_unknown_keys(
        extra in arb_extra_fields(TYPED_KEYS),
        nested in arb_extra_fields(SESSION_INFO_KEYS),
        epochs in prop::collection::vec(2i32..1_000, 1..5),
    ) {
        let document = document_with(&extra, &nested);
        let mut bytes = serde_json::to_vec(&document).unwrap();

        for epoch in &epochs {
            let credential = CredentialCodec::decode(&bytes).unwrap();
            let mut session = credential.session().clone();
            session.token = format!("token-{epoch}");
            session.session_info.epoch = *epoch;
            bytes = CredentialCodec::encode(&credential.with_session(session)).unwrap();
        }

        let saved: Value = serde_json::from_slice(&bytes).unwrap();
        let last = *epochs.last().unwrap();
        prop_assert_eq!(&saved["token"], &Value::from(format!("token-{last}")));
        prop_assert_eq!(&saved["session_info"]["epoch"], &Value::from(last));
        for (k, v) in &extra {
            prop_assert_eq!(&saved[k.as_str()], v);
        }
        for (k, _) in &nested {
            prop_assert_eq!(&saved["session_info"][k.as_str()], &document["session_info"][k.as_str()]);
        }
    }
}

#[tokio::test]
async fn test_store_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let document = credential_document();
    std::fs::write(&path, serde_json::to_vec_pretty(&document).unwrap()).unwrap();

    let store = TokenStore::new(&path);
    let credential = store.load().await.unwrap();
    store.save(&credential).await.unwrap();

    let saved: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(saved, document);
    assert!(!dir.path().join("session.json.tmp").exists());
}

#[tokio::test]
async fn test_store_rejects_malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, br#"{"org_id": "o", "role_id": "r"}"#).unwrap();

    let result = TokenStore::new(&path).load().await;
    assert!(matches!(
        result,
        Err(signer_sidecar::SignerError::Malformed { .. })
    ));
}

#[tokio::test]
async fn test_disabled_store_save_is_noop() {
    let bytes = serde_json::to_vec(&credential_document()).unwrap();
    let credential = CredentialCodec::decode(&bytes).unwrap();

    TokenStore::new("").save(&credential).await.unwrap();
    TokenStore::disabled().save(&credential).await.unwrap();
}

#[tokio::test]
async fn test_save_to_unwritable_path_is_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("session.json");
    let bytes = serde_json::to_vec(&credential_document()).unwrap();
    let credential = CredentialCodec::decode(&bytes).unwrap();

    assert!(matches!(
        TokenStore::new(&path).save(&credential).await,
        Err(signer_sidecar::SignerError::Persistence { .. })
    ));
}

fn refreshed_credential() -> SessionCredential {
    let bytes = serde_json::to_vec(&credential_document()).unwrap();
    let credential = CredentialCodec::decode(&bytes).unwrap();
    credential.with_session(session("token-1", 2, at(7_200), at(90_000)))
}

#[cfg(unix)]
#[tokio::test]
async fn test_save_keeps_file_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, serde_json::to_vec(&credential_document()).unwrap()).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();

    TokenStore::new(&path).save(&refreshed_credential()).await.unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
    let saved: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(saved["token"], "token-1");
}

#[cfg(unix)]
#[tokio::test]
async fn test_save_creates_new_file_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    TokenStore::new(&path).save(&refreshed_credential()).await.unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}

#[cfg(unix)]
#[tokio::test]
async fn test_save_through_symlink_updates_target() {
    let dir = tempfile::tempdir().unwrap();
    let real = dir.path().join("real.json");
    let link = dir.path().join("session.json");
    std::fs::write(&real, serde_json::to_vec(&credential_document()).unwrap()).unwrap();
    std::os::unix::fs::symlink(&real, &link).unwrap();

    TokenStore::new(&link).save(&refreshed_credential()).await.unwrap();

    assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    let saved: Value = serde_json::from_slice(&std::fs::read(&real).unwrap()).unwrap();
    assert_eq!(saved["token"], "token-1");
    assert_eq!(saved["env"], credential_document()["env"]);
    assert!(!dir.path().join("real.json.tmp").exists());
}
