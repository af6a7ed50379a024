//! Session credential and its file codec.
//!
//! The credential document is decoded twice: once into the typed fields the
//! sidecar uses and once into a raw JSON map. Encoding merges the typed fields
//! back into that map so keys this sidecar does not model survive rewrites.

use cubesigner_client::{AuthData, NewSessionResponse, SessionInfo};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Typed view of the credential document.
#[derive(Serialize, Deserialize)]
struct CredentialDocument {
    org_id: String,
    role_id: String,
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    session_info: SessionInfo,
}

/// Role session credential.
///
/// Replaced wholesale on each refresh; `extra_fields` keeps every key of the
/// last loaded document, including the ones the typed fields also own.
#[derive(Clone, PartialEq)]
pub struct SessionCredential {
    org_id: String,
    role_id: String,
    session: NewSessionResponse,
    extra_fields: Map<String, Value>,
}

impl SessionCredential {
    /// Build a credential from a freshly issued session.
    #[must_use]
    pub fn new(
        org_id: impl Into<String>,
        role_id: impl Into<String>,
        session: NewSessionResponse,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            role_id: role_id.into(),
            session,
            extra_fields: Map::new(),
        }
    }

    /// Successor credential after a refresh: same scope, same extra fields.
    #[must_use]
    pub fn with_session(&self, session: NewSessionResponse) -> Self {
        Self {
            org_id: self.org_id.clone(),
            role_id: self.role_id.clone(),
            session,
            extra_fields: self.extra_fields.clone(),
        }
    }

    /// Bearer token for key and signing calls.
    #[must_use]
    pub fn bearer_token(&self) -> &str {
        &self.session.token
    }

    /// Refresh evidence: epoch number, epoch token and refresh token.
    #[must_use]
    pub fn auth_data(&self) -> AuthData {
        self.session.session_info.auth_data()
    }

    /// Auth token expiry, epoch seconds.
    #[must_use]
    pub const fn auth_token_exp(&self) -> u64 {
        self.session.session_info.auth_token_exp
    }

    /// Refresh token expiry, epoch seconds.
    #[must_use]
    pub const fn refresh_token_exp(&self) -> u64 {
        self.session.session_info.refresh_token_exp
    }

    /// Organization the role belongs to.
    #[must_use]
    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    /// Role the session was issued for.
    #[must_use]
    pub fn role_id(&self) -> &str {
        &self.role_id
    }

    /// Session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session.session_info.session_id
    }

    /// Issued session.
    #[must_use]
    pub const fn session(&self) -> &NewSessionResponse {
        &self.session
    }

    /// Raw document keys retained from the last load.
    #[must_use]
    pub const fn extra_fields(&self) -> &Map<String, Value> {
        &self.extra_fields
    }

    fn to_document(&self) -> CredentialDocument {
        CredentialDocument {
            org_id: self.org_id.clone(),
            role_id: self.role_id.clone(),
            token: self.session.token.clone(),
            refresh_token: self.session.refresh_token.clone(),
            expiration: self.session.expiration,
            purpose: self.session.purpose.clone(),
            session_info: self.session.session_info.clone(),
        }
    }

    fn from_document(document: CredentialDocument, extra_fields: Map<String, Value>) -> Self {
        Self {
            org_id: document.org_id,
            role_id: document.role_id,
            session: NewSessionResponse {
                token: document.token,
                refresh_token: document.refresh_token,
                expiration: document.expiration,
                purpose: document.purpose,
                session_info: document.session_info,
            },
            extra_fields,
        }
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("org_id", &self.org_id)
            .field("role_id", &self.role_id)
            .field("session", &self.session)
            .field("extra_fields", &self.extra_fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// JSON codec for credential documents.
pub struct CredentialCodec;

impl CredentialCodec {
    /// Decode a credential document.
    ///
    /// # Errors
    ///
    /// Fails if the bytes are not a JSON object carrying the typed fields.
    pub fn decode(bytes: &[u8]) -> Result<SessionCredential, serde_json::Error> {
        let document: CredentialDocument = serde_json::from_slice(bytes)?;
        let raw: Map<String, Value> = serde_json::from_slice(bytes)?;
        Ok(SessionCredential::from_document(document, raw))
    }

    /// Encode a credential, typed fields taking precedence over retained keys.
    ///
    /// # Errors
    ///
    /// Fails only if serialization itself fails.
    pub fn encode(credential: &SessionCredential) -> Result<Vec<u8>, serde_json::Error> {
        let mut merged = credential.extra_fields.clone();
        if let Value::Object(typed) = serde_json::to_value(credential.to_document())? {
            merge_into(&mut merged, typed);
        }
        serde_json::to_vec_pretty(&merged)
    }
}

/// Overlay `typed` onto `target`, recursing into objects present on both sides.
fn merge_into(target: &mut Map<String, Value>, typed: Map<String, Value>) {
    for (key, value) in typed {
        let slot = target.entry(key).or_insert(Value::Null);
        match (slot, value) {
            (Value::Object(existing), Value::Object(incoming)) => merge_into(existing, incoming),
            (slot, value) => *slot = value,
        }
    }
}
