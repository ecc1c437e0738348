//! `Authorization: HMAC <token>,<mac>,<salt>` resolution.
//!
//! Every rejection is `Unauthenticated`; the reason is logged, never returned.
//! With request signatures enforced the MAC must cover the request, `x-date`
//! must be within the allowed drift and each (token, salt) pair is accepted
//! once.

use std::{sync::Arc, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine};
use bw_crypto::mac;
use bw_proto::headers::{header_str, X_DATE};
use bw_store::{ExpiringKeyValueStore, MemoryKvStore, Session, TokenStore};
use chrono::{DateTime, FixedOffset, Utc};
use http::{header::AUTHORIZATION, Request};
use tracing::debug;

use crate::{config::GatewaySettings, error::GatewayError};

const SCHEME: &str = "HMAC";
const REPLAY_SLACK: Duration = Duration::from_secs(2);

/// Fields of a parsed `Authorization` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationFields<'a> {
    pub access_token: &'a str,
    /// Reserved fields after the token, in order.
    pub extra: Vec<&'a str>,
}

/// Split `HMAC <token>[,field...]`.  `None` if the scheme or token is missing.
pub fn parse_authorization(value: &str) -> Option<AuthorizationFields<'_>> {
    let rest = value.trim().strip_prefix(SCHEME)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let mut fields = rest.trim().split(',').map(str::trim);
    let access_token = fields.next().filter(|t| !t.is_empty())?;
    Some(AuthorizationFields { access_token, extra: fields.collect() })
}

/// Client side: the `Authorization` value for a request signed with `session`.
pub fn authorization_value(
    session: &Session,
    method: &str,
    path: &str,
    body: &[u8],
    date: &str,
) -> Result<String, GatewayError> {
    let ikm = session.token.ikm_bytes()?;
    let salt = mac::generate_salt();
    let message = mac::signature_string(method, path, body, date, &salt);
    let tag = mac::sign_request(&ikm, &salt, &message).map_err(bw_proto::ProtoError::from)?;
    Ok(format!(
        "{SCHEME} {},{},{}",
        session.token.access_token,
        STANDARD.encode(tag),
        STANDARD.encode(salt)
    ))
}

#[derive(Clone)]
pub struct AuthHeaderParser {
    tokens: TokenStore,
    seen_salts: Arc<dyn ExpiringKeyValueStore<String, ()>>,
    require_signature: bool,
    max_drift: Duration,
}

impl AuthHeaderParser {
    pub fn new(tokens: TokenStore, settings: &GatewaySettings) -> Self {
        Self::with_replay_cache(tokens, settings, Arc::new(MemoryKvStore::<String, ()>::new()))
    }

    pub fn with_replay_cache(
        tokens: TokenStore,
        settings: &GatewaySettings,
        seen_salts: Arc<dyn ExpiringKeyValueStore<String, ()>>,
    ) -> Self {
        Self {
            tokens,
            seen_salts,
            require_signature: settings.require_request_signature,
            max_drift: settings.max_clock_drift(),
        }
    }

    /// Session of an authenticated request.  `claimed_user_id`, when present,
    /// must be the session's owner.
    pub async fn resolve<B: AsRef<[u8]>>(
        &self,
        request: &Request<B>,
        claimed_user_id: Option<&str>,
    ) -> Result<Session, GatewayError> {
        let Some(value) = header_str(request.headers(), &AUTHORIZATION) else {
            return reject("authorization header missing or not ascii");
        };
        let Some(fields) = parse_authorization(value) else {
            return reject("authorization header is not HMAC");
        };
        let Some(session) = self.tokens.resolve(fields.access_token).await? else {
            return reject("access token not recognised");
        };

        if self.require_signature {
            self.verify_signature(request, &session, &fields.extra).await?;
        }

        if let Some(claimed) = claimed_user_id {
            if claimed != session.user_id() {
                return reject("token owner does not match claimed user");
            }
        }

        debug!(token_id = %session.token.id, user_id = %session.user_id(), "request authenticated");
        Ok(session)
    }

    async fn verify_signature<B: AsRef<[u8]>>(
        &self,
        request: &Request<B>,
        session: &Session,
        extra: &[&str],
    ) -> Result<(), GatewayError> {
        let [mac_b64, salt_b64] = extra else {
            return reject("authorization header lacks mac and salt");
        };
        let (Ok(tag), Ok(salt)) = (STANDARD.decode(mac_b64), STANDARD.decode(salt_b64)) else {
            return reject("authorization mac or salt is not base64");
        };
        let Some(date) = header_str(request.headers(), &X_DATE) else {
            return reject("x-date header missing");
        };
        let Some(sent_at) = parse_date(date) else {
            return reject("x-date header unparseable");
        };
        let drift_ms = (Utc::now() - sent_at.with_timezone(&Utc))
            .num_milliseconds()
            .unsigned_abs();
        if u128::from(drift_ms) > self.max_drift.as_millis() {
            return reject("x-date outside allowed drift");
        }

        let path = request
            .uri()
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/");
        let message = mac::signature_string(
            request.method().as_str(),
            path,
            request.body().as_ref(),
            date,
            &salt,
        );
        let ikm = session.token.ikm_bytes()?;
        if mac::verify_request(&ikm, &salt, &message, &tag).is_err() {
            return reject("request mac mismatch");
        }

        let replay_key = format!("{}:{}", session.token.id, salt_b64);
        if !self
            .seen_salts
            .set_if_absent(replay_key, (), replay_window(self.max_drift))
            .await?
        {
            return reject("request salt replayed");
        }
        Ok(())
    }
}

/// How long a seen salt is remembered.  A request passes the drift check for
/// at most `2 * max_drift` after it is first seen; the extra slack covers
/// whole-second `x-date` values.
fn replay_window(max_drift: Duration) -> Duration {
    max_drift
        .saturating_mul(2)
        .saturating_add(REPLAY_SLACK)
}

fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
}

fn reject<T>(why: &'static str) -> Result<T, GatewayError> {
    debug!(reason = why, "authorization rejected");
    Err(GatewayError::Unauthenticated)
}
