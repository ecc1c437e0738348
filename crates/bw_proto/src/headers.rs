//! HTTP header contract.
//!
//! | Header                | Direction      | Meaning                                  |
//! |-----------------------|----------------|------------------------------------------|
//! | `x-pubkey`            | both           | base64 box public key                    |
//! | `x-nonce`             | v1             | base64 nonce                             |
//! | `x-signature`         | v1             | base64 detached signature over plaintext |
//! | `x-sigpubkey`         | v1             | base64 signer public key                 |
//! | `x-hashid`            | v1 / inbound   | opaque ephemeral-key identifier          |
//! | `x-pubkey-expiration` | response (v1)  | ephemeral key expiry (unix seconds)      |
//! | `x-reason`            | error response | human-readable rejection reason          |

use base64::{engine::general_purpose::STANDARD, Engine};
use bw_crypto::PUBLIC_KEY_BYTES;
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::{
    envelope::{self, DetachedEnvelope, EmbeddedEnvelope, Envelope, Version},
    error::ProtoError,
};

pub const X_PUBKEY: HeaderName = HeaderName::from_static("x-pubkey");
pub const X_NONCE: HeaderName = HeaderName::from_static("x-nonce");
pub const X_SIGNATURE: HeaderName = HeaderName::from_static("x-signature");
pub const X_SIGPUBKEY: HeaderName = HeaderName::from_static("x-sigpubkey");
pub const X_HASHID: HeaderName = HeaderName::from_static("x-hashid");
pub const X_PUBKEY_EXPIRATION: HeaderName = HeaderName::from_static("x-pubkey-expiration");
pub const X_REASON: HeaderName = HeaderName::from_static("x-reason");
pub const X_DATE: HeaderName = HeaderName::from_static("x-date");

/// Identity of the ephemeral key that sealed a response.  Audit only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralKeyInfo {
    pub hash: String,
    pub expires_at: i64,
}

pub fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn header_b64(headers: &HeaderMap, name: &HeaderName) -> Result<Vec<u8>, ProtoError> {
    let value = header_str(headers, name)
        .ok_or_else(|| ProtoError::MalformedEnvelope(format!("missing {name} header")))?;
    STANDARD
        .decode(value.trim())
        .map_err(|_| ProtoError::MalformedEnvelope(format!("{name} is not base64")))
}

/// The peer's box public key for an exchange of the given version.
///
/// V2 reads it from the decoded body; V1 requires a 32-byte `x-pubkey` header.
pub fn peer_public_key(
    version: Version,
    decoded_body: &[u8],
    headers: &HeaderMap,
) -> Result<[u8; PUBLIC_KEY_BYTES], ProtoError> {
    match version {
        Version::V2 => envelope::public_key_from_envelope(decoded_body),
        Version::V1 => {
            let value = header_str(headers, &X_PUBKEY).ok_or(ProtoError::MissingPublicKey)?;
            // Undecodable base64 can never produce a 32-byte key.
            let raw = STANDARD.decode(value.trim()).unwrap_or_default();
            raw.as_slice()
                .try_into()
                .map_err(|_| ProtoError::InvalidPublicKeyLength(raw.len()))
        }
    }
}

/// Parse an inbound encrypted request body (base64 text) plus its headers.
pub fn read_request_envelope(raw_body: &[u8], headers: &HeaderMap) -> Result<Envelope, ProtoError> {
    let decoded = envelope::decode_body(raw_body)?;
    match envelope::get_version(&decoded)? {
        Version::V2 => Ok(Envelope::V2(EmbeddedEnvelope::from_bytes(&decoded)?)),
        Version::V1 => {
            let sender = peer_public_key(Version::V1, &decoded, headers)?;
            let nonce = header_b64(headers, &X_NONCE)?;
            let signature = header_b64(headers, &X_SIGNATURE)?;
            let signer = header_b64(headers, &X_SIGPUBKEY)?;
            Ok(Envelope::V1(DetachedEnvelope::from_parts(
                decoded, &nonce, &sender, &signature, &signer,
            )?))
        }
    }
}

fn set(headers: &mut HeaderMap, name: HeaderName, value: String) -> Result<(), ProtoError> {
    headers.insert(name, HeaderValue::try_from(value)?);
    Ok(())
}

/// Side-channel metadata of a V1 envelope.  V2 envelopes carry none.
pub fn write_v1_headers(
    headers: &mut HeaderMap,
    env: &DetachedEnvelope,
    key: &EphemeralKeyInfo,
) -> Result<(), ProtoError> {
    set(headers, X_SIGPUBKEY, STANDARD.encode(env.signer_public_key()))?;
    set(headers, X_SIGNATURE, STANDARD.encode(env.signature()))?;
    set(headers, X_HASHID, key.hash.clone())?;
    set(headers, X_PUBKEY_EXPIRATION, key.expires_at.to_string())?;
    set(headers, X_NONCE, STANDARD.encode(env.nonce()))?;
    set(headers, X_PUBKEY, STANDARD.encode(env.sender_public_key()))?;
    Ok(())
}

/// Metadata of a legacy 25519 response.  The signature covers the ciphertext
/// and `x-pubkey` is the session's long-lived box key.
pub fn write_legacy_headers(
    headers: &mut HeaderMap,
    nonce: &[u8],
    box_public_key: &[u8; PUBLIC_KEY_BYTES],
    sign_public_key: &[u8; PUBLIC_KEY_BYTES],
    signature: &[u8],
) -> Result<(), ProtoError> {
    set(headers, X_NONCE, STANDARD.encode(nonce))?;
    set(headers, X_PUBKEY, STANDARD.encode(box_public_key))?;
    set(headers, X_SIGPUBKEY, STANDARD.encode(sign_public_key))?;
    set(headers, X_SIGNATURE, STANDARD.encode(signature))?;
    Ok(())
}

/// Attach a rejection reason.
pub fn write_reason(headers: &mut HeaderMap, reason: &str) -> Result<(), ProtoError> {
    set(headers, X_REASON, reason.to_string())
}
