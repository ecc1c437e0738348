//! Per-request HMAC carried in the `Authorization: HMAC <token>,<mac>,<salt>` header.
//!
//! The MAC key is HKDF(ikm, salt, "HMAC|AuthenticationKey"), so every request
//! salt yields a fresh key.  The signed string is
//!
//! ```text
//! sha256_hex(body) \n METHOD+path \n date \n salt_b64
//! ```

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::{error::CryptoError, kdf::hkdf_expand};

type HmacSha256 = Hmac<Sha256>;

pub const SALT_BYTES: usize = 32;
const MAC_KEY_INFO: &[u8] = b"HMAC|AuthenticationKey";

/// Fresh random request salt.
pub fn generate_salt() -> [u8; SALT_BYTES] {
    let mut salt = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Canonical string covered by the request MAC.
pub fn signature_string(method: &str, path: &str, body: &[u8], date: &str, salt: &[u8]) -> String {
    let body_hash = hex::encode(Sha256::digest(body));
    format!(
        "{body_hash}\n{}+{path}\n{date}\n{}",
        method.to_ascii_uppercase(),
        STANDARD.encode(salt)
    )
}

fn mac_for(ikm: &[u8], salt: &[u8], message: &str) -> Result<HmacSha256, CryptoError> {
    let mut key = Zeroizing::new([0u8; 32]);
    hkdf_expand(ikm, Some(salt), MAC_KEY_INFO, key.as_mut())?;
    let mut mac = HmacSha256::new_from_slice(key.as_ref())
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(mac)
}

/// Compute the 32-byte request MAC.
pub fn sign_request(ikm: &[u8], salt: &[u8], message: &str) -> Result<[u8; 32], CryptoError> {
    Ok(mac_for(ikm, salt, message)?.finalize().into_bytes().into())
}

/// Constant-time check of a request MAC.
pub fn verify_request(ikm: &[u8], salt: &[u8], message: &str, tag: &[u8]) -> Result<(), CryptoError> {
    mac_for(ikm, salt, message)?
        .verify_slice(tag)
        .map_err(|_| CryptoError::MacVerification)
}
