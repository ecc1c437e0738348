//! Gateway error type and its HTTP mapping.
//!
//! Error responses carry a status and at most an `x-reason` header, never a
//! body.  Unauthenticated responses never say which check failed, and the
//! decryption and signature failures share a single reason.

use bw_proto::{headers, ProtoError};
use bw_store::StoreError;
use http::{header::CONTENT_LENGTH, HeaderValue, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, error, warn};

pub const REASON_MISSING_PUBKEY: &str =
    "Accept: application/vnd.ncryptf+json requires x-pubkey header to be set.";
pub const REASON_PUBKEY_LENGTH: &str = "Public key is not 32 bytes in length.";
pub const REASON_MALFORMED: &str = "Encrypted body is malformed.";
pub const REASON_UNSUPPORTED_VERSION: &str = "Encrypted body version is not supported.";
pub const REASON_UNREADABLE: &str = "Encrypted body could not be read.";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("No session key material to encrypt the response with")]
    NotAcceptableForEncryption,

    #[error("Envelope error: {0}")]
    Proto(#[from] ProtoError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GatewayError::NotAcceptableForEncryption => StatusCode::NOT_ACCEPTABLE,
            GatewayError::Proto(ProtoError::Header(_) | ProtoError::Crypto(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::Proto(_) => StatusCode::BAD_REQUEST,
            GatewayError::Store(StoreError::KeyPersistenceFailed(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::Store(_) | GatewayError::Serialize(_) | GatewayError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing `x-reason`, for client errors only.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            GatewayError::Proto(e) => match e {
                ProtoError::MissingPublicKey => Some(REASON_MISSING_PUBKEY),
                ProtoError::InvalidPublicKeyLength(_) => Some(REASON_PUBKEY_LENGTH),
                ProtoError::MalformedEnvelope(_) => Some(REASON_MALFORMED),
                ProtoError::UnsupportedVersion(_) => Some(REASON_UNSUPPORTED_VERSION),
                ProtoError::DecryptionFailed | ProtoError::SignatureInvalid => {
                    Some(REASON_UNREADABLE)
                }
                ProtoError::Header(_) | ProtoError::Crypto(_) => None,
            },
            _ => None,
        }
    }

    /// Only a failed ephemeral-key write may be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Store(StoreError::KeyPersistenceFailed(_)))
    }

    pub fn into_response(self) -> Response<String> {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
        } else if status == StatusCode::NOT_ACCEPTABLE {
            warn!("no session key material, refusing to encrypt response");
        } else {
            debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let mut response = Response::new(String::new());
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        if let Some(reason) = self.reason() {
            // Static ASCII reasons always form a valid header value.
            let _ = headers::write_reason(response.headers_mut(), reason);
        }
        response
    }
}
