//! Authenticated public-key encryption ("box")
//!
//! X25519 key agreement + XSalsa20-Poly1305, wire-compatible with NaCl
//! `crypto_box`.  Key size: 32 bytes.  Nonce: 24 bytes (random).  Tag: 16 bytes.
//!
//! The nonce is NOT prepended here; envelope layout is the caller's concern.

use std::fmt;

use crypto_box::{
    aead::{generic_array::GenericArray, Aead},
    PublicKey, SalsaBox, SecretKey,
};
use rand::RngCore;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;

pub const PUBLIC_KEY_BYTES: usize = 32;
pub const SECRET_KEY_BYTES: usize = 32;
pub const NONCE_BYTES: usize = 24;
pub const MAC_BYTES: usize = 16;

/// Box key pair.  The public half is always derived from the secret half.
#[derive(Clone, ZeroizeOnDrop)]
pub struct BoxKeyPair {
    #[zeroize(skip)]
    public: [u8; PUBLIC_KEY_BYTES],
    secret_bytes: [u8; SECRET_KEY_BYTES],
}

impl BoxKeyPair {
    /// Fresh key pair from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut seed = Zeroizing::new([0u8; SECRET_KEY_BYTES]);
        rand::rngs::OsRng.fill_bytes(seed.as_mut());
        Self::from_seed(*seed)
    }

    /// Rebuild a key pair from a stored secret key.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; SECRET_KEY_BYTES] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "Box secret key must be {SECRET_KEY_BYTES} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::from_seed(arr))
    }

    pub(crate) fn from_seed(seed: [u8; SECRET_KEY_BYTES]) -> Self {
        let secret = SecretKey::from(seed);
        Self {
            public: *secret.public_key().as_bytes(),
            secret_bytes: secret.to_bytes(),
        }
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_BYTES] {
        &self.public
    }

    pub fn secret_bytes(&self) -> &[u8; SECRET_KEY_BYTES] {
        &self.secret_bytes
    }

    /// Combined box of our secret key with the peer's public key.
    fn salsa_box(&self, peer_public: &[u8; PUBLIC_KEY_BYTES]) -> SalsaBox {
        SalsaBox::new(
            &PublicKey::from(*peer_public),
            &SecretKey::from(self.secret_bytes),
        )
    }

    /// Encrypt `plaintext` for `peer_public`.  Output is ciphertext + 16-byte tag.
    pub fn seal(
        &self,
        peer_public: &[u8; PUBLIC_KEY_BYTES],
        nonce: &[u8; NONCE_BYTES],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        self.salsa_box(peer_public)
            .encrypt(GenericArray::from_slice(nonce), plaintext)
            .map_err(|_| CryptoError::BoxSeal)
    }

    /// Decrypt a box sealed by `peer_public` for this key pair.
    pub fn open(
        &self,
        peer_public: &[u8; PUBLIC_KEY_BYTES],
        nonce: &[u8; NONCE_BYTES],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if ciphertext.len() < MAC_BYTES {
            return Err(CryptoError::BoxOpen);
        }
        self.salsa_box(peer_public)
            .decrypt(GenericArray::from_slice(nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| CryptoError::BoxOpen)
    }
}

impl fmt::Debug for BoxKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxKeyPair")
            .field("public", &hex::encode(self.public))
            .finish_non_exhaustive()
    }
}

/// Fresh random 24-byte nonce.
pub fn generate_nonce() -> [u8; NONCE_BYTES] {
    let mut nonce = [0u8; NONCE_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Parse a 32-byte public key, rejecting any other length.
pub fn public_key_from_slice(bytes: &[u8]) -> Result<[u8; PUBLIC_KEY_BYTES], CryptoError> {
    bytes.try_into().map_err(|_| {
        CryptoError::InvalidKey(format!(
            "Public key must be {PUBLIC_KEY_BYTES} bytes, got {}",
            bytes.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();
        let nonce = generate_nonce();

        let ct = alice.seal(bob.public_key(), &nonce, b"{\"ok\":true}").unwrap();
        assert_eq!(ct.len(), 11 + MAC_BYTES);

        let pt = bob.open(alice.public_key(), &nonce, &ct).unwrap();
        assert_eq!(pt.as_slice(), b"{\"ok\":true}");
    }

    #[test]
    fn open_with_wrong_key_fails() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();
        let mallory = BoxKeyPair::generate();
        let nonce = generate_nonce();

        let ct = alice.seal(bob.public_key(), &nonce, b"secret").unwrap();
        assert!(matches!(
            mallory.open(alice.public_key(), &nonce, &ct),
            Err(CryptoError::BoxOpen)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();
        let nonce = generate_nonce();

        let mut ct = alice.seal(bob.public_key(), &nonce, b"secret").unwrap();
        ct[0] ^= 0x01;
        assert!(bob.open(alice.public_key(), &nonce, &ct).is_err());
    }

    #[test]
    fn public_key_is_derived_from_secret() {
        let kp = BoxKeyPair::generate();
        let rebuilt = BoxKeyPair::from_secret_bytes(kp.secret_bytes()).unwrap();
        assert_eq!(kp.public_key(), rebuilt.public_key());
    }

    #[test]
    fn rejects_short_secret() {
        assert!(BoxKeyPair::from_secret_bytes(&[0u8; 31]).is_err());
        assert!(public_key_from_slice(&[0u8; 33]).is_err());
    }
}
