//! Versioned encrypted envelope: the body a peer sees on the wire.
//!
//! Two layouts coexist and the version alone decides which one applies:
//!
//! V1 (detached):  body = ciphertext.  Nonce, sender key and an Ed25519
//!   signature over the PLAINTEXT travel in headers (see `headers`).
//!
//! V2 (embedded):
//!   [ DE 25 90 02 | nonce (24) | sender public key (32) | ciphertext + tag ]
//!   No detached signature; authenticity rests on the box tag alone.
//!
//! Bodies are always base64 text over HTTP; this module works on the decoded
//! bytes.

use base64::{engine::general_purpose::STANDARD, Engine};
use bw_crypto::{
    boxes::{self, MAC_BYTES},
    sign, BoxKeyPair, SigningKeyPair, NONCE_BYTES, PUBLIC_KEY_BYTES, SIGNATURE_BYTES,
};
use tracing::debug;

use crate::error::ProtoError;

/// First three bytes of every self-describing (V2+) envelope.
pub const ENVELOPE_PREFIX: [u8; 3] = [0xDE, 0x25, 0x90];
pub const V2_TAG: u8 = 0x02;

/// Version tag + nonce + sender public key.
pub const V2_HEADER_BYTES: usize = 4 + NONCE_BYTES + PUBLIC_KEY_BYTES;
/// Smallest well-formed V2 envelope: header plus an empty box (tag only).
pub const V2_MIN_BYTES: usize = V2_HEADER_BYTES + MAC_BYTES;

const NONCE_OFFSET: usize = 4;
const PUBLIC_KEY_OFFSET: usize = NONCE_OFFSET + NONCE_BYTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    V1,
    V2,
}

impl Version {
    pub fn as_u8(self) -> u8 {
        match self {
            Version::V1 => 1,
            Version::V2 => 2,
        }
    }
}

/// Read the version of a decoded body without attempting decryption.
///
/// Bodies starting with `ENVELOPE_PREFIX` declare their version in the fourth
/// byte; anything else (including an empty body) is V1.
pub fn get_version(raw: &[u8]) -> Result<Version, ProtoError> {
    if raw.len() >= 4 && raw[..3] == ENVELOPE_PREFIX {
        return match raw[3] {
            V2_TAG => Ok(Version::V2),
            other => Err(ProtoError::UnsupportedVersion(other)),
        };
    }
    Ok(Version::V1)
}

/// Extract the sender public key embedded in a V2 envelope.
///
/// Fails closed on anything shorter than `V2_MIN_BYTES`.
pub fn public_key_from_envelope(raw: &[u8]) -> Result<[u8; PUBLIC_KEY_BYTES], ProtoError> {
    check_v2_shape(raw)?;
    let mut key = [0u8; PUBLIC_KEY_BYTES];
    key.copy_from_slice(&raw[PUBLIC_KEY_OFFSET..PUBLIC_KEY_OFFSET + PUBLIC_KEY_BYTES]);
    Ok(key)
}

fn check_v2_shape(raw: &[u8]) -> Result<(), ProtoError> {
    if raw.len() < V2_MIN_BYTES {
        return Err(ProtoError::MalformedEnvelope(format!(
            "v2 envelope is {} bytes, expected at least {V2_MIN_BYTES}",
            raw.len()
        )));
    }
    match get_version(raw)? {
        Version::V2 => Ok(()),
        Version::V1 => Err(ProtoError::MalformedEnvelope(
            "missing v2 version tag".into(),
        )),
    }
}

/// Decode a base64 request/response body.  Surrounding whitespace is ignored.
pub fn decode_body(body: &[u8]) -> Result<Vec<u8>, ProtoError> {
    let start = body.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(body.len());
    let end = body.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    let trimmed = &body[start..end];
    STANDARD
        .decode(trimmed)
        .map_err(|e| ProtoError::MalformedEnvelope(format!("body is not base64: {e}")))
}

/// V1 envelope: ciphertext in the body, metadata out of band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedEnvelope {
    ciphertext: Vec<u8>,
    nonce: [u8; NONCE_BYTES],
    sender_public_key: [u8; PUBLIC_KEY_BYTES],
    signature: [u8; SIGNATURE_BYTES],
    signer_public_key: [u8; PUBLIC_KEY_BYTES],
}

impl DetachedEnvelope {
    /// Assemble from a decoded body plus the values carried in request headers.
    pub fn from_parts(
        ciphertext: Vec<u8>,
        nonce: &[u8],
        sender_public_key: &[u8],
        signature: &[u8],
        signer_public_key: &[u8],
    ) -> Result<Self, ProtoError> {
        Ok(Self {
            ciphertext,
            nonce: fixed(nonce, "nonce")?,
            sender_public_key: boxes::public_key_from_slice(sender_public_key)
                .map_err(|_| ProtoError::InvalidPublicKeyLength(sender_public_key.len()))?,
            signature: fixed(signature, "signature")?,
            signer_public_key: fixed(signer_public_key, "signer public key")?,
        })
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn nonce(&self) -> &[u8; NONCE_BYTES] {
        &self.nonce
    }

    pub fn sender_public_key(&self) -> &[u8; PUBLIC_KEY_BYTES] {
        &self.sender_public_key
    }

    pub fn signature(&self) -> &[u8; SIGNATURE_BYTES] {
        &self.signature
    }

    pub fn signer_public_key(&self) -> &[u8; PUBLIC_KEY_BYTES] {
        &self.signer_public_key
    }
}

/// V2 envelope: everything needed to open it travels in the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedEnvelope {
    ciphertext: Vec<u8>,
    nonce: [u8; NONCE_BYTES],
    sender_public_key: [u8; PUBLIC_KEY_BYTES],
}

impl EmbeddedEnvelope {
    pub fn from_bytes(raw: &[u8]) -> Result<Self, ProtoError> {
        check_v2_shape(raw)?;
        let mut nonce = [0u8; NONCE_BYTES];
        nonce.copy_from_slice(&raw[NONCE_OFFSET..PUBLIC_KEY_OFFSET]);
        Ok(Self {
            ciphertext: raw[V2_HEADER_BYTES..].to_vec(),
            nonce,
            sender_public_key: public_key_from_envelope(raw)?,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(V2_HEADER_BYTES + self.ciphertext.len());
        out.extend_from_slice(&ENVELOPE_PREFIX);
        out.push(V2_TAG);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.sender_public_key);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn nonce(&self) -> &[u8; NONCE_BYTES] {
        &self.nonce
    }

    pub fn sender_public_key(&self) -> &[u8; PUBLIC_KEY_BYTES] {
        &self.sender_public_key
    }
}

/// An encrypted message.  Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    V1(DetachedEnvelope),
    V2(EmbeddedEnvelope),
}

impl Envelope {
    pub fn version(&self) -> Version {
        match self {
            Envelope::V1(_) => Version::V1,
            Envelope::V2(_) => Version::V2,
        }
    }

    /// Raw body bytes (before base64).
    pub fn body_bytes(&self) -> Vec<u8> {
        match self {
            Envelope::V1(env) => env.ciphertext.clone(),
            Envelope::V2(env) => env.to_bytes(),
        }
    }

    /// Body as sent over HTTP.
    pub fn to_body(&self) -> String {
        STANDARD.encode(self.body_bytes())
    }

    pub fn sender_public_key(&self) -> &[u8; PUBLIC_KEY_BYTES] {
        match self {
            Envelope::V1(env) => &env.sender_public_key,
            Envelope::V2(env) => &env.sender_public_key,
        }
    }
}

/// Encrypt `plaintext` for `recipient_public` under the given version.
///
/// V1 signs the plaintext with `signer`; V2 does not sign at all.
pub fn encrypt(
    version: Version,
    plaintext: &[u8],
    sender: &BoxKeyPair,
    recipient_public: &[u8; PUBLIC_KEY_BYTES],
    signer: &SigningKeyPair,
) -> Result<Envelope, ProtoError> {
    let nonce = boxes::generate_nonce();
    let ciphertext = sender.seal(recipient_public, &nonce, plaintext)?;

    let envelope = match version {
        Version::V1 => Envelope::V1(DetachedEnvelope {
            ciphertext,
            nonce,
            sender_public_key: *sender.public_key(),
            signature: signer.sign(plaintext),
            signer_public_key: *signer.public_key(),
        }),
        Version::V2 => Envelope::V2(EmbeddedEnvelope {
            ciphertext,
            nonce,
            sender_public_key: *sender.public_key(),
        }),
    };
    debug!(
        version = version.as_u8(),
        plaintext_len = plaintext.len(),
        "envelope sealed"
    );
    Ok(envelope)
}

/// Open an envelope addressed to `recipient`.
///
/// V1: the box must open AND the detached signature must verify against the
/// recovered plaintext; either failure rejects the whole envelope.
pub fn decrypt(envelope: &Envelope, recipient: &BoxKeyPair) -> Result<Vec<u8>, ProtoError> {
    match envelope {
        Envelope::V1(env) => {
            let plaintext = recipient
                .open(&env.sender_public_key, &env.nonce, &env.ciphertext)
                .map_err(|_| ProtoError::DecryptionFailed)?;
            sign::verify_detached(&env.signer_public_key, &plaintext, &env.signature)
                .map_err(|_| ProtoError::SignatureInvalid)?;
            Ok(plaintext.to_vec())
        }
        Envelope::V2(env) => {
            let plaintext = recipient
                .open(&env.sender_public_key, &env.nonce, &env.ciphertext)
                .map_err(|_| ProtoError::DecryptionFailed)?;
            Ok(plaintext.to_vec())
        }
    }
}

fn fixed<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N], ProtoError> {
    bytes.try_into().map_err(|_| {
        ProtoError::MalformedEnvelope(format!("{what} must be {N} bytes, got {}", bytes.len()))
    })
}
