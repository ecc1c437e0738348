//! bw_proto: versioned envelope codec for Boxwire
//!
//! Bodies are opaque base64 on the wire.  The version is read from the decoded
//! body before any decryption is attempted, then one `encrypt` / `decrypt`
//! pair dispatches on the `Envelope` variant.
//!
//! # Modules
//! - `envelope`: version negotiation, V1/V2 layouts, encrypt/decrypt
//! - `headers`: `x-*` header contract for V1 metadata and error reasons
//! - `format`: content types and `Accept` negotiation
//! - `error`: codec error type

pub mod envelope;
pub mod error;
pub mod format;
pub mod headers;

pub use envelope::{decrypt, encrypt, get_version, Envelope, Version};
pub use error::ProtoError;
pub use format::ResponseFormat;
pub use headers::EphemeralKeyInfo;
