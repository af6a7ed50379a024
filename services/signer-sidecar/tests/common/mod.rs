//! Shared fixtures for sidecar integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use cubesigner_client::{
    ApiResult, AuthData, BlobSignRequest, CreateTokenRequest, KeyInfo, NewSessionResponse,
    SessionInfo, SignResponse, SignerApi,
};
use mockall::mock;
use serde_json::{json, Value};
use signer_sidecar::session::Clock;
use signer_sidecar::storage::SessionCredential;

pub const ORG_ID: &str = "Org#aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa";
pub const ROLE_ID: &str = "bls_signer";
pub const KEY_ID: &str = "Key#BlsAvaIcm_0x856218c1a1a84cd4e25321fe7bde03260d2686da";

/// Wall-clock start of every test clock.
pub const EPOCH: i64 = 1_743_000_000;

mock! {
    pub Api {}

    #[async_trait]
    impl SignerApi for Api {
        async fn get_key(&self, org_id: &str, key_id: &str, auth: &str) -> ApiResult<KeyInfo>;

        async fn blob_sign(
            &self,
            org_id: &str,
            key_id: &str,
            request: &BlobSignRequest,
            auth: &str,
        ) -> ApiResult<SignResponse>;

        async fn refresh_session(
            &self,
            org_id: &str,
            auth_data: &AuthData,
            auth: &str,
        ) -> ApiResult<NewSessionResponse>;

        async fn create_role_token(
            &self,
            org_id: &str,
            role_id: &str,
            request: &CreateTokenRequest,
            auth: &str,
        ) -> ApiResult<NewSessionResponse>;
    }
}

/// Clock starting at [`EPOCH`] and advancing with tokio time, so paused-time
/// tests control it through `tokio::time::advance` and auto-advance.
pub struct TestClock {
    start: tokio::time::Instant,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        let base = DateTime::from_timestamp(EPOCH, 0).unwrap_or(DateTime::UNIX_EPOCH);
        base + TimeDelta::from_std(self.start.elapsed()).unwrap_or(TimeDelta::zero())
    }
}

/// Epoch seconds `offset` seconds away from [`EPOCH`].
pub fn at(offset: i64) -> u64 {
    u64::try_from(EPOCH + offset).unwrap()
}

/// Session issued at `epoch` with the given absolute expiries.
pub fn session(token: &str, epoch: i32, auth_token_exp: u64, refresh_token_exp: u64) -> NewSessionResponse {
    NewSessionResponse {
        token: token.to_string(),
        refresh_token: Some(format!("{token}.refresh")),
        expiration: Some(refresh_token_exp),
        purpose: Some("sidecar tests".to_string()),
        session_info: SessionInfo {
            auth_token: format!("{token}-auth"),
            auth_token_exp,
            epoch,
            epoch_token: format!("epoch-{epoch}"),
            refresh_token: format!("{token}-refresh"),
            refresh_token_exp,
            session_id: "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa".to_string(),
        },
    }
}

pub fn credential(token: &str, auth_token_exp: u64, refresh_token_exp: u64) -> SessionCredential {
    SessionCredential::new(ORG_ID, ROLE_ID, session(token, 1, auth_token_exp, refresh_token_exp))
}

/// Credential document as written by an older sidecar, with keys this one
/// does not model.
pub fn credential_document() -> Value {
    json!({
        "org_id": ORG_ID,
        "role_id": ROLE_ID,
        "expiration": 1_774_551_174u64,
        "purpose": "Role session for bls_signer",
        "token": "token-0",
        "refresh_token": "token-0.refresh",
        "env": {
            "Dev-CubeSignerStack": {
                "SignerApiRoot": "https://gamma.signer.cubist.dev",
                "DefaultCredentialRpId": "cubist.dev",
                "EncExportS3BucketName": null
            }
        },
        "session_info": {
            "auth_token": "token-0-auth",
            "auth_token_exp": at(3_600),
            "epoch": 1,
            "epoch_token": "epoch-1",
            "refresh_token": "token-0-refresh",
            "refresh_token_exp": at(86_400),
            "session_id": "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa",
            "issuer": "cubist"
        }
    })
}
