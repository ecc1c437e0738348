//! bw_crypto: Boxwire cryptographic primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Box key pairs and signing key pairs are distinct types and never interchange.
//!
//! # Module layout
//! - `boxes`: X25519 + XSalsa20-Poly1305 box key pairs, seal/open
//! - `sign`: Ed25519 detached signatures
//! - `kdf`: HKDF session key derivation from `ikm`
//! - `mac`: per-request HMAC-SHA256 for the `Authorization` header
//! - `hash`: BLAKE3 opaque identifiers
//! - `error`: unified error type

pub mod boxes;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod mac;
pub mod sign;

pub use boxes::{BoxKeyPair, NONCE_BYTES, PUBLIC_KEY_BYTES};
pub use error::CryptoError;
pub use kdf::SessionKeys;
pub use sign::{SigningKeyPair, SIGNATURE_BYTES};
