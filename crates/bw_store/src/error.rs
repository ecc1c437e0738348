use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Storage backend unavailable: {0}")]
    Backend(String),

    #[error("Failed to persist ephemeral key: {0}")]
    KeyPersistenceFailed(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] bw_crypto::CryptoError),

    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),
}
