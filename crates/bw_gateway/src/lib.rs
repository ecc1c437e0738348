//! bw_gateway: authenticated, encrypted request/response handling for Boxwire
//!
//! Framework-agnostic: handlers pass `http::Request` values in and get
//! `http::Response<String>` values back.
//!
//! # Modules
//! - `auth`: `Authorization: HMAC` parsing, request MAC and replay checks
//! - `formatter`: JSON, legacy 25519 and ncryptf response bodies; request opening
//! - `config`: `GatewaySettings` and their loading
//! - `error`: `GatewayError` and its HTTP status / `x-reason` mapping

pub mod auth;
pub mod config;
pub mod error;
pub mod formatter;

pub use auth::AuthHeaderParser;
pub use config::{load_settings, GatewaySettings};
pub use error::GatewayError;
pub use formatter::ResponseFormatter;

use bw_store::{KeyStore, TokenStore};

/// Parser and formatter wired to one set of stores.
#[derive(Clone)]
pub struct Gateway {
    pub auth: AuthHeaderParser,
    pub formatter: ResponseFormatter,
    pub tokens: TokenStore,
}

impl Gateway {
    pub fn new(tokens: TokenStore, keys: KeyStore, settings: &GatewaySettings) -> Self {
        Self {
            auth: AuthHeaderParser::new(tokens.clone(), settings),
            formatter: ResponseFormatter::new(keys),
            tokens,
        }
    }

    /// Everything in process memory.
    pub fn in_memory(settings: &GatewaySettings) -> Self {
        Self::new(
            TokenStore::in_memory(),
            KeyStore::in_memory(settings.key_ttl()),
            settings,
        )
    }
}
