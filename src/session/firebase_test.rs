use super::*;

#[test]
fn parse_sign_up_success() {
    let json = serde_json::json!({
        "kind": "identitytoolkit#SignupNewUserResponse",
        "idToken": "eyJhbGciOi...",
        "refreshToken": "AMf-vBx...",
        "expiresIn": "3600",
        "localId": "Xq2bN1"
    })
    .to_string();
    let identity = parse_sign_up_response(&json).unwrap();
    assert_eq!(identity.uid, "Xq2bN1");
    assert_eq!(identity.id_token, "eyJhbGciOi...");
    assert_eq!(identity.refresh_token, "AMf-vBx...");
    assert_eq!(identity.expires_in, Duration::from_secs(3600));
}

#[test]
fn parse_sign_up_missing_local_id() {
    let json = serde_json::json!({ "idToken": "t", "refreshToken": "r", "expiresIn": "3600" }).to_string();
    assert!(matches!(parse_sign_up_response(&json), Err(SessionError::Parse(_))));
}

#[test]
fn parse_sign_up_bad_expiry() {
    let json = serde_json::json!({
        "idToken": "t", "refreshToken": "r", "expiresIn": "soon", "localId": "u"
    })
    .to_string();
    let err = parse_sign_up_response(&json).unwrap_err();
    assert!(err.to_string().contains("invalid expiresIn"));
}

#[test]
fn parse_refresh_success() {
    let json = serde_json::json!({
        "expires_in": "3600",
        "token_type": "Bearer",
        "refresh_token": "r2",
        "id_token": "t2",
        "user_id": "Xq2bN1",
        "project_id": "1234"
    })
    .to_string();
    let identity = parse_refresh_response(&json).unwrap();
    assert_eq!(identity.uid, "Xq2bN1");
    assert_eq!(identity.id_token, "t2");
    assert_eq!(identity.refresh_token, "r2");
}

#[test]
fn anonymous_sign_in_disabled_maps_to_rejected() {
    let body = serde_json::json!({
        "error": { "code": 400, "message": "ADMIN_ONLY_OPERATION", "errors": [] }
    })
    .to_string();
    assert!(matches!(
        error_from_response(400, body),
        SessionError::Rejected(message) if message == "ADMIN_ONLY_OPERATION"
    ));
}

#[test]
fn server_error_keeps_status() {
    assert!(matches!(error_from_response(502, "bad gateway".into()), SessionError::Response { status: 502, .. }));
}

#[test]
fn refresh_delay_leaves_margin_before_expiry() {
    assert_eq!(refresh_delay(Duration::from_secs(3600)), Duration::from_secs(3300));
}

#[test]
fn refresh_delay_has_floor_for_short_tokens() {
    assert_eq!(refresh_delay(Duration::from_secs(60)), MIN_REFRESH_DELAY);
}

fn refreshed(expires_in: Duration) -> Identity {
    Identity { uid: "u1".into(), id_token: "tok".into(), refresh_token: "ref".into(), expires_in }
}

#[test]
fn next_delay_after_success_follows_new_expiry() {
    let result = Ok(refreshed(Duration::from_secs(3600)));
    assert_eq!(next_refresh_delay(&result), Some(Duration::from_secs(3300)));
}

#[test]
fn next_delay_after_failure_is_retry_delay_not_full_lifetime() {
    let result = Err(SessionError::Request("connection reset".into()));
    assert_eq!(next_refresh_delay(&result), Some(REFRESH_RETRY_DELAY));
    assert!(REFRESH_RETRY_DELAY < refresh_delay(Duration::from_secs(3600)));
}

#[test]
fn repeated_failures_keep_retrying_before_token_expires() {
    // First attempt at 3300s, then retries every REFRESH_RETRY_DELAY.
    let mut elapsed = refresh_delay(Duration::from_secs(3600));
    let failure = Err(SessionError::Response { status: 503, body: String::new() });
    elapsed += next_refresh_delay(&failure).unwrap();
    assert!(elapsed < Duration::from_secs(3600));
}

#[test]
fn next_delay_without_identity_stops_loop() {
    assert_eq!(next_refresh_delay(&Err(SessionError::NoIdentity)), None);
}

#[tokio::test]
async fn refresh_without_identity_is_rejected_without_request() {
    let auth = AnonymousAuth::new("key".into(), "app".into()).unwrap();
    assert!(matches!(auth.refresh().await, Err(SessionError::NoIdentity)));
    assert!(auth.current_identity().is_none());
}
