use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Box seal failed")]
    BoxSeal,

    #[error("Box open failed (authentication tag mismatch or wrong key)")]
    BoxOpen,

    #[error("Signature verification failed")]
    SignatureVerification,

    #[error("Request MAC verification failed")]
    MacVerification,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),
}
