use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("Unsupported envelope version: {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("Missing x-pubkey header")]
    MissingPublicKey,

    #[error("Public key is not 32 bytes in length (got {0})")]
    InvalidPublicKeyLength(usize),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Unable to decrypt envelope")]
    DecryptionFailed,

    #[error("Envelope signature is invalid")]
    SignatureInvalid,

    #[error("Invalid header value: {0}")]
    Header(#[from] http::header::InvalidHeaderValue),

    #[error("Crypto error: {0}")]
    Crypto(#[from] bw_crypto::CryptoError),
}
