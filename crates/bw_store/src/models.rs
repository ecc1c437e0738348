//! Stored records.  Binary material is base64 (standard alphabet) so rows stay
//! text in every backend.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use bw_crypto::{boxes, BoxKeyPair, SessionKeys, SigningKeyPair, PUBLIC_KEY_BYTES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::StoreError;

fn b64d(field: &str, value: &str) -> Result<Vec<u8>, StoreError> {
    STANDARD
        .decode(value)
        .map_err(|e| StoreError::Corrupt(format!("{field}: {e}")))
}

/// One authenticated session.  Deleting it invalidates every request bearing
/// its access token.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessToken {
    pub id: String,
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Base64 initial keying material; session keys and request MAC keys derive from it.
    pub ikm: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn ikm_bytes(&self) -> Result<Zeroizing<Vec<u8>>, StoreError> {
        b64d("ikm", &self.ikm).map(Zeroizing::new)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Long-lived key pairs bound to an `AccessToken`, derived once from its `ikm`.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionKeyMaterial {
    pub box_secret_key: String,
    pub box_public_key: String,
    pub sign_secret_key: String,
    pub sign_public_key: String,
    /// Client box key registered for the legacy 25519 response format.
    pub client_public_key: Option<String>,
}

impl SessionKeyMaterial {
    pub fn from_keys(keys: &SessionKeys) -> Self {
        Self {
            box_secret_key: STANDARD.encode(keys.box_pair.secret_bytes()),
            box_public_key: STANDARD.encode(keys.box_pair.public_key()),
            sign_secret_key: STANDARD.encode(keys.sign_pair.secret_bytes()),
            sign_public_key: STANDARD.encode(keys.sign_pair.public_key()),
            client_public_key: None,
        }
    }

    pub fn box_pair(&self) -> Result<BoxKeyPair, StoreError> {
        let secret = Zeroizing::new(b64d("box_secret_key", &self.box_secret_key)?);
        Ok(BoxKeyPair::from_secret_bytes(&secret)?)
    }

    pub fn sign_pair(&self) -> Result<SigningKeyPair, StoreError> {
        let secret = Zeroizing::new(b64d("sign_secret_key", &self.sign_secret_key)?);
        Ok(SigningKeyPair::from_bytes(&secret)?)
    }

    pub fn client_public(&self) -> Result<Option<[u8; PUBLIC_KEY_BYTES]>, StoreError> {
        self.client_public_key
            .as_deref()
            .map(|v| Ok(boxes::public_key_from_slice(&b64d("client_public_key", v)?)?))
            .transpose()
    }
}

impl fmt::Debug for SessionKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeyMaterial")
            .field("box_public_key", &self.box_public_key)
            .field("sign_public_key", &self.sign_public_key)
            .field("client_public_key", &self.client_public_key)
            .finish_non_exhaustive()
    }
}

/// An access token together with its key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: AccessToken,
    pub keys: SessionKeyMaterial,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.token.user_id
    }
}

/// Ephemeral box key pair that seals exactly one response.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptionKey {
    pub id: String,
    /// Base64 box secret key.  Never leaves the server.
    pub secret_key: String,
    /// Opaque identifier handed to the client; unrelated to the key bytes.
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl EncryptionKey {
    pub fn box_pair(&self) -> Result<BoxKeyPair, StoreError> {
        let secret = Zeroizing::new(b64d("secret_key", &self.secret_key)?);
        Ok(BoxKeyPair::from_secret_bytes(&secret)?)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("id", &self.id)
            .field("hash", &self.hash)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Flat SQL row for a `Session`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub ikm: String,
    pub expires_at: DateTime<Utc>,
    pub box_secret_key: String,
    pub box_public_key: String,
    pub sign_secret_key: String,
    pub sign_public_key: String,
    pub client_public_key: Option<String>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            token: AccessToken {
                id: row.id,
                user_id: row.user_id,
                access_token: row.access_token,
                refresh_token: row.refresh_token,
                ikm: row.ikm,
                expires_at: row.expires_at,
            },
            keys: SessionKeyMaterial {
                box_secret_key: row.box_secret_key,
                box_public_key: row.box_public_key,
                sign_secret_key: row.sign_secret_key,
                sign_public_key: row.sign_public_key,
                client_public_key: row.client_public_key,
            },
        }
    }
}
