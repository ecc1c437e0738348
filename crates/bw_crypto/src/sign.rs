//! Ed25519 detached signatures.
//!
//! Signing keys are kept apart from box keys: a `SigningKeyPair` only signs,
//! a `BoxKeyPair` only encrypts.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;

pub const SIGNATURE_BYTES: usize = 64;

#[derive(Clone, ZeroizeOnDrop)]
pub struct SigningKeyPair {
    #[zeroize(skip)]
    public: [u8; 32],
    secret_bytes: [u8; 32],
}

impl SigningKeyPair {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self {
            public: signing_key.verifying_key().to_bytes(),
            secret_bytes: signing_key.to_bytes(),
        }
    }

    /// Rebuild from a 32-byte Ed25519 seed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("Signing key must be 32 bytes, got {}", bytes.len()))
        })?;
        let signing_key = SigningKey::from_bytes(&arr);
        Ok(Self {
            public: signing_key.verifying_key().to_bytes(),
            secret_bytes: arr,
        })
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public
    }

    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret_bytes
    }

    /// Sign arbitrary bytes; returns the 64-byte raw Ed25519 signature.
    pub fn sign(&self, msg: &[u8]) -> [u8; SIGNATURE_BYTES] {
        SigningKey::from_bytes(&self.secret_bytes).sign(msg).to_bytes()
    }
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("public", &hex::encode(self.public))
            .finish_non_exhaustive()
    }
}

/// Verify a detached signature made by any Ed25519 public key.
pub fn verify_detached(public: &[u8], msg: &[u8], sig: &[u8]) -> Result<(), CryptoError> {
    let public: [u8; 32] = public
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("Bad signer public key length".into()))?;
    let vk = VerifyingKey::from_bytes(&public).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let sig: [u8; SIGNATURE_BYTES] = sig
        .try_into()
        .map_err(|_| CryptoError::SignatureVerification)?;
    vk.verify_strict(msg, &Signature::from_bytes(&sig))
        .map_err(|_| CryptoError::SignatureVerification)
}
