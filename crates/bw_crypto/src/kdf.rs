//! Key derivation functions
//!
//! `SessionKeys::derive`: HKDF-SHA256 over a session's `ikm`, yielding the
//!   long-lived box and signing key pairs bound to one access token.
//!
//! `hkdf_expand`: shared helper, also used for per-request MAC keys.

use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{boxes::BoxKeyPair, error::CryptoError, sign::SigningKeyPair};

pub const IKM_BYTES: usize = 32;

const SESSION_SALT: &[u8] = b"boxwire-session-v1";
const BOX_INFO: &[u8] = b"bw-box-keypair";
const SIGN_INFO: &[u8] = b"bw-sign-keypair";

/// Expand `ikm` + `info` into `output.len()` bytes of key material.
///
/// `salt` may be `None` (HKDF will use a zeroed salt).
pub fn hkdf_expand(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    output: &mut [u8],
) -> Result<(), CryptoError> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    hk.expand(info, output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
}

/// Fresh 32-byte initial keying material for a new session.
pub fn generate_ikm() -> Zeroizing<[u8; IKM_BYTES]> {
    let mut ikm = Zeroizing::new([0u8; IKM_BYTES]);
    rand::rngs::OsRng.fill_bytes(ikm.as_mut());
    ikm
}

/// Long-lived key pairs of one session.  Box and sign seeds are independent
/// HKDF outputs, so neither pair reveals anything about the other.
#[derive(Debug, Clone)]
pub struct SessionKeys {
    pub box_pair: BoxKeyPair,
    pub sign_pair: SigningKeyPair,
}

impl SessionKeys {
    pub fn derive(ikm: &[u8]) -> Result<Self, CryptoError> {
        if ikm.len() < 16 {
            return Err(CryptoError::KeyDerivation(format!(
                "ikm too short: {} bytes",
                ikm.len()
            )));
        }

        let mut box_seed = Zeroizing::new([0u8; 32]);
        hkdf_expand(ikm, Some(SESSION_SALT), BOX_INFO, box_seed.as_mut())?;

        let mut sign_seed = Zeroizing::new([0u8; 32]);
        hkdf_expand(ikm, Some(SESSION_SALT), SIGN_INFO, sign_seed.as_mut())?;

        Ok(Self {
            box_pair: BoxKeyPair::from_seed(*box_seed),
            sign_pair: SigningKeyPair::from_bytes(sign_seed.as_ref())?,
        })
    }
}
