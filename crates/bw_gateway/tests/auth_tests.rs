use bw_gateway::{auth::authorization_value, Gateway, GatewayError, GatewaySettings};
use bw_store::Session;
use chrono::{Duration, SecondsFormat, Utc};
use http::{header::AUTHORIZATION, Request};

const PATH: &str = "/api/v1/items?page=2";
const BODY: &[u8] = br#"{"name":"widget"}"#;

async fn setup(settings: GatewaySettings) -> (Gateway, Session) {
    let gateway = Gateway::in_memory(&settings);
    let session = gateway
        .tokens
        .issue("user-1", settings.session_ttl())
        .await
        .unwrap();
    (gateway, session)
}

fn request(authorization: Option<&str>, date: Option<&str>, body: &[u8]) -> Request<Vec<u8>> {
    let mut builder = Request::builder().method("POST").uri(PATH);
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    if let Some(value) = date {
        builder = builder.header("x-date", value);
    }
    builder.body(body.to_vec()).unwrap()
}

fn signed(session: &Session) -> Request<Vec<u8>> {
    let date = Utc::now().to_rfc2822();
    let auth = authorization_value(session, "POST", PATH, BODY, &date).unwrap();
    request(Some(&auth), Some(&date), BODY)
}

#[tokio::test]
async fn signed_request_resolves_session() {
    let (gateway, session) = setup(GatewaySettings::default()).await;
    let found = gateway.auth.resolve(&signed(&session), Some("user-1")).await.unwrap();
    assert_eq!(found.token.id, session.token.id);
}

#[tokio::test]
async fn malformed_headers_are_unauthenticated() {
    let (gateway, session) = setup(GatewaySettings::default()).await;
    let unregistered = format!("HMAC {}x", session.token.access_token);
    for value in [
        None,
        Some(""),
        Some("Bogus abc"),
        Some(session.token.access_token.as_str()),
        Some(unregistered.as_str()),
    ] {
        let err = gateway
            .auth
            .resolve(&request(value, None, BODY), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unauthenticated), "{value:?}");
    }
}

#[tokio::test]
async fn claimed_user_mismatch_is_unauthenticated() {
    let (gateway, session) = setup(GatewaySettings::default()).await;
    let err = gateway
        .auth
        .resolve(&signed(&session), Some("user-2"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Unauthenticated));
}

#[tokio::test]
async fn replayed_salt_is_rejected() {
    let (gateway, session) = setup(GatewaySettings::default()).await;
    let req = signed(&session);
    gateway.auth.resolve(&req, None).await.unwrap();
    let err = gateway.auth.resolve(&req, None).await.unwrap_err();
    assert!(matches!(err, GatewayError::Unauthenticated));
}

#[tokio::test]
async fn tampered_body_is_rejected() {
    let (gateway, session) = setup(GatewaySettings::default()).await;
    let date = Utc::now().to_rfc2822();
    let auth = authorization_value(&session, "POST", PATH, BODY, &date).unwrap();
    let req = request(Some(&auth), Some(&date), br#"{"name":"gadget"}"#);
    let err = gateway.auth.resolve(&req, None).await.unwrap_err();
    assert!(matches!(err, GatewayError::Unauthenticated));
}

#[tokio::test]
async fn stale_or_missing_date_is_rejected() {
    let (gateway, session) = setup(GatewaySettings::default()).await;

    let stale = (Utc::now() - Duration::minutes(10)).to_rfc2822();
    let auth = authorization_value(&session, "POST", PATH, BODY, &stale).unwrap();
    let err = gateway
        .auth
        .resolve(&request(Some(&auth), Some(&stale), BODY), None)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Unauthenticated));

    let date = Utc::now().to_rfc2822();
    let auth = authorization_value(&session, "POST", PATH, BODY, &date).unwrap();
    let err = gateway
        .auth
        .resolve(&request(Some(&auth), None, BODY), None)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Unauthenticated));
}

#[tokio::test]
async fn bare_token_needs_signature_when_enforced() {
    let (gateway, session) = setup(GatewaySettings::default()).await;
    let bare = format!("HMAC {}", session.token.access_token);
    let err = gateway
        .auth
        .resolve(&request(Some(&bare), None, BODY), None)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Unauthenticated));
}

#[tokio::test]
async fn bare_token_accepted_when_signatures_disabled() {
    let settings = GatewaySettings {
        require_request_signature: false,
        ..GatewaySettings::default()
    };
    let (gateway, session) = setup(settings).await;
    let bare = format!("HMAC {},ignored,fields", session.token.access_token);
    let found = gateway
        .auth
        .resolve(&request(Some(&bare), None, BODY), Some("user-1"))
        .await
        .unwrap();
    assert_eq!(found.token.id, session.token.id);
}

#[tokio::test]
async fn revoked_token_is_unauthenticated() {
    let (gateway, session) = setup(GatewaySettings::default()).await;
    assert!(gateway.tokens.revoke(&session.token.id).await.unwrap());
    let err = gateway.auth.resolve(&signed(&session), None).await.unwrap_err();
    assert!(matches!(err, GatewayError::Unauthenticated));
}

fn signed_at(session: &Session, date: &str) -> Request<Vec<u8>> {
    let auth = authorization_value(session, "POST", PATH, BODY, date).unwrap();
    request(Some(&auth), Some(date), BODY)
}

#[tokio::test]
async fn future_dated_request_cannot_be_replayed_after_twice_the_drift() {
    let settings = GatewaySettings { max_clock_drift_secs: 1, ..GatewaySettings::default() };
    let (gateway, session) = setup(settings).await;
    let date = (Utc::now() + Duration::milliseconds(900)).to_rfc3339_opts(SecondsFormat::Millis, true);
    let req = signed_at(&session, &date);
    gateway.auth.resolve(&req, None).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(2_050)).await;
    let err = gateway.auth.resolve(&req, None).await.unwrap_err();
    assert!(matches!(err, GatewayError::Unauthenticated));
}

#[tokio::test]
async fn drift_is_measured_below_the_second() {
    let settings = GatewaySettings { max_clock_drift_secs: 1, ..GatewaySettings::default() };
    let (gateway, session) = setup(settings).await;
    let date = (Utc::now() + Duration::milliseconds(1_600)).to_rfc3339_opts(SecondsFormat::Millis, true);
    let err = gateway
        .auth
        .resolve(&signed_at(&session, &date), None)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Unauthenticated));
}

#[tokio::test]
async fn oversized_drift_setting_does_not_overflow() {
    let settings = GatewaySettings { max_clock_drift_secs: u64::MAX, ..GatewaySettings::default() };
    let (gateway, session) = setup(settings).await;
    let req = signed(&session);
    gateway.auth.resolve(&req, None).await.unwrap();
    let err = gateway.auth.resolve(&req, None).await.unwrap_err();
    assert!(matches!(err, GatewayError::Unauthenticated));
}
