//! Response formats selected by content negotiation.

use serde::{Deserialize, Serialize};

/// Which encoding a response body gets.  Fixed by the request's `Accept`
/// header; decides which codec path runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Plain JSON, no encryption.
    Json,
    /// Legacy session box: sealed with the session's long-lived box key.
    Json25519,
    /// Versioned envelope sealed with a fresh ephemeral key.
    Ncryptf,
}

impl ResponseFormat {
    pub const fn media_type(self) -> &'static str {
        match self {
            ResponseFormat::Json => "application/json",
            ResponseFormat::Json25519 => "application/vnd.25519+json",
            ResponseFormat::Ncryptf => "application/vnd.ncryptf+json",
        }
    }

    /// Value of the response `Content-Type` header.
    pub const fn content_type(self) -> &'static str {
        match self {
            ResponseFormat::Json => "application/json; charset=UTF-8",
            ResponseFormat::Json25519 => "application/json+25519; charset=UTF-8",
            ResponseFormat::Ncryptf => "application/vnd.ncryptf+json; charset=UTF-8",
        }
    }

    pub const fn requires_session(self) -> bool {
        !matches!(self, ResponseFormat::Json)
    }

    /// Pick the first supported media type in an `Accept` header, in the
    /// client's order.  Quality values are ignored.  `None` when nothing matches.
    pub fn negotiate(accept: Option<&str>) -> Option<Self> {
        let Some(accept) = accept else {
            return Some(ResponseFormat::Json);
        };
        accept.split(',').find_map(|entry| {
            let media = entry.split(';').next().unwrap_or_default().trim();
            match media.to_ascii_lowercase().as_str() {
                "application/json" | "*/*" | "application/*" => Some(ResponseFormat::Json),
                "application/vnd.25519+json" => Some(ResponseFormat::Json25519),
                "application/vnd.ncryptf+json" => Some(ResponseFormat::Ncryptf),
                _ => None,
            }
        })
    }
}
