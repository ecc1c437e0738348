//! Encrypted response formatting and encrypted request opening.
//!
//! For the ncryptf format the order is fixed: negotiate the version, validate
//! the peer key, serialise, require a session, mint the ephemeral key, seal,
//! then write headers.  Every failure becomes a bodiless error response; a
//! format that requires encryption never falls back to plaintext.

use base64::{engine::general_purpose::STANDARD, Engine};
use bw_crypto::{boxes, BoxKeyPair};
use bw_proto::{
    envelope::{self, Envelope},
    headers::{self, header_str, X_HASHID},
    EphemeralKeyInfo, ResponseFormat,
};
use bw_store::{KeyStore, Session};
use http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Request, Response, StatusCode,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::GatewayError;

/// Response format requested by `Accept`.  `None` when nothing supported is named.
pub fn negotiate<B>(request: &Request<B>) -> Option<ResponseFormat> {
    ResponseFormat::negotiate(header_str(request.headers(), &ACCEPT))
}

#[derive(Clone)]
pub struct ResponseFormatter {
    keys: KeyStore,
}

impl ResponseFormatter {
    pub fn new(keys: KeyStore) -> Self {
        Self { keys }
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    /// Format `payload` for `request`.  Errors become their HTTP response.
    pub async fn format<B, T>(
        &self,
        request: &Request<B>,
        session: Option<&Session>,
        format: ResponseFormat,
        payload: &T,
    ) -> Response<String>
    where
        B: AsRef<[u8]>,
        T: Serialize + ?Sized,
    {
        match self.try_format(request, session, format, payload).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    pub async fn try_format<B, T>(
        &self,
        request: &Request<B>,
        session: Option<&Session>,
        format: ResponseFormat,
        payload: &T,
    ) -> Result<Response<String>, GatewayError>
    where
        B: AsRef<[u8]>,
        T: Serialize + ?Sized,
    {
        match format {
            ResponseFormat::Json => {
                let body = serde_json::to_string(payload)?;
                Ok(respond(format, body))
            }
            ResponseFormat::Json25519 => {
                let plaintext = serde_json::to_vec(payload)?;
                self.seal_legacy(session, &plaintext)
            }
            ResponseFormat::Ncryptf => self.seal_ncryptf(request, session, payload).await,
        }
    }

    async fn seal_ncryptf<B, T>(
        &self,
        request: &Request<B>,
        session: Option<&Session>,
        payload: &T,
    ) -> Result<Response<String>, GatewayError>
    where
        B: AsRef<[u8]>,
        T: Serialize + ?Sized,
    {
        // A body that is not base64 carries no envelope, so the exchange is V1.
        let decoded = envelope::decode_body(request.body().as_ref()).unwrap_or_default();
        let version = envelope::get_version(&decoded)?;
        let peer = headers::peer_public_key(version, &decoded, request.headers())?;

        let plaintext = serde_json::to_vec(payload)?;
        let Some(session) = session else {
            return Err(GatewayError::NotAcceptableForEncryption);
        };

        let key = self.keys.generate().await?;
        let sender = key.box_pair()?;
        let signer = session.keys.sign_pair()?;
        let sealed = bw_proto::encrypt(version, &plaintext, &sender, &peer, &signer)?;

        let mut response = respond(ResponseFormat::Ncryptf, sealed.to_body());
        if let Envelope::V1(env) = &sealed {
            let info = EphemeralKeyInfo {
                hash: key.hash.clone(),
                expires_at: key.expires_at.timestamp(),
            };
            headers::write_v1_headers(response.headers_mut(), env, &info)?;
        }
        debug!(
            version = version.as_u8(),
            token_id = %session.token.id,
            key_id = %key.id,
            "response sealed"
        );
        Ok(response)
    }

    /// Legacy 25519 format: sealed with the session box key to the client key
    /// bound at login, signature over the ciphertext.
    fn seal_legacy(
        &self,
        session: Option<&Session>,
        plaintext: &[u8],
    ) -> Result<Response<String>, GatewayError> {
        let Some(session) = session else {
            return Err(GatewayError::NotAcceptableForEncryption);
        };
        let Some(client) = session.keys.client_public()? else {
            warn!(token_id = %session.token.id, "no client key bound for 25519 response");
            return Err(GatewayError::NotAcceptableForEncryption);
        };

        let box_pair = session.keys.box_pair()?;
        let sign_pair = session.keys.sign_pair()?;
        let nonce = boxes::generate_nonce();
        let ciphertext = box_pair
            .seal(&client, &nonce, plaintext)
            .map_err(bw_proto::ProtoError::from)?;
        let signature = sign_pair.sign(&ciphertext);

        let body = STANDARD.encode(&ciphertext);
        let mut response = respond(ResponseFormat::Json25519, body);
        headers::write_legacy_headers(
            response.headers_mut(),
            &nonce,
            box_pair.public_key(),
            sign_pair.public_key(),
            &signature,
        )?;
        Ok(response)
    }

    /// Decrypt an encrypted request body.  The recipient is the ephemeral key
    /// named by `x-hashid` (consumed, one use) or else the session box key.
    pub async fn open_request<B: AsRef<[u8]>>(
        &self,
        request: &Request<B>,
        session: &Session,
    ) -> Result<Vec<u8>, GatewayError> {
        let envelope = headers::read_request_envelope(request.body().as_ref(), request.headers())?;
        let recipient: BoxKeyPair = match header_str(request.headers(), &X_HASHID) {
            Some(hash) => match self.keys.consume(hash.trim()).await? {
                Some(key) => key.box_pair()?,
                None => {
                    debug!("x-hashid names no live ephemeral key");
                    return Err(bw_proto::ProtoError::DecryptionFailed.into());
                }
            },
            None => session.keys.box_pair()?,
        };
        let plaintext = bw_proto::decrypt(&envelope, &recipient)?;
        debug!(
            version = envelope.version().as_u8(),
            token_id = %session.token.id,
            "request opened"
        );
        Ok(plaintext)
    }
}

fn respond(format: ResponseFormat, body: String) -> Response<String> {
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(format.content_type()));
    response
}
