//! bw_store: session tokens, ephemeral keys and their storage backends
//!
//! # Storage model
//! - Ephemeral response keys live in an `ExpiringKeyValueStore`; the backend
//!   enforces their TTL and a key is consumed by the request it answers.
//! - Sessions (access token, IKM, derived key material) live behind the
//!   `SessionStore` seam, in memory or in SQLite.
//! - Binary fields are base64 text so every backend stores plain strings.
//!
//! # Migration
//! SQLx migrations in `migrations/` are run when a SQLite store is opened.

pub mod error;
pub mod key_store;
pub mod kv;
pub mod models;
pub mod session;
pub mod sqlite;
pub mod token_store;

pub use error::StoreError;
pub use key_store::KeyStore;
pub use kv::{ExpiringKeyValueStore, MemoryKvStore, DEFAULT_PURGE_INTERVAL};
pub use models::{AccessToken, EncryptionKey, Session, SessionKeyMaterial};
pub use session::{MemorySessionStore, SessionStore};
pub use sqlite::SqliteSessionStore;
pub use token_store::TokenStore;
