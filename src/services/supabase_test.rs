use super::*;
use crate::services::identity::Role;

#[test]
fn parse_user_reads_metadata() {
    let body = r#"{
        "id": "6f1c",
        "email": "shop@example.com",
        "user_metadata": {"name": "Shop", "user_type": "retailer", "onboarding_completed": true}
    }"#;
    let p = parse_user(body).unwrap();
    assert_eq!(p.id, "6f1c");
    assert_eq!(p.role, Some(Role::Retailer));
    assert_eq!(p.email.as_deref(), Some("shop@example.com"));
    assert_eq!(p.name.as_deref(), Some("Shop"));
    assert!(p.onboarding_completed);
}

#[test]
fn parse_user_defaults_missing_metadata() {
    let p = parse_user(r#"{"id":"u1","email":null}"#).unwrap();
    assert_eq!(p.role, Some(Role::Customer));
    assert!(!p.onboarding_completed);
    assert!(p.name.is_none());
}

#[test]
fn parse_user_flags_unknown_role() {
    let p = parse_user(r#"{"id":"u1","user_metadata":{"role":"admin"}}"#).unwrap();
    assert_eq!(p.role, None);
}

#[test]
fn parse_user_rejects_garbage() {
    assert!(matches!(parse_user("not json"), Err(IdentityError::Parse(_))));
    assert!(matches!(parse_user(r#"{"email":"x"}"#), Err(IdentityError::Parse(_))));
}

#[test]
fn parse_session_extracts_tokens_and_user() {
    let body = r#"{
        "access_token": "jwt",
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": "r1",
        "user": {"id": "u1", "email": "a@b.ie", "user_metadata": {"role": "retailer"}}
    }"#;
    let s = parse_session(body).unwrap();
    assert_eq!(s.access_token, "jwt");
    assert_eq!(s.refresh_token.as_deref(), Some("r1"));
    assert_eq!(s.expires_in, Some(3600));
    assert_eq!(s.principal.role, Some(Role::Retailer));
}

#[test]
fn parse_sign_up_accepts_bare_user_or_session() {
    let bare = parse_sign_up(r#"{"id":"u1","email":"a@b.ie","user_metadata":{"user_type":"customer"}}"#).unwrap();
    assert_eq!(bare.id, "u1");

    let wrapped = parse_sign_up(r#"{"access_token":"t","user":{"id":"u2","email":"a@b.ie"}}"#).unwrap();
    assert_eq!(wrapped.id, "u2");

    let null_user = parse_sign_up(r#"{"id":"u3","user":null}"#).unwrap();
    assert_eq!(null_user.id, "u3");
}

#[test]
fn error_message_prefers_description() {
    assert_eq!(
        error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
        "Invalid login credentials"
    );
    assert_eq!(error_message(r#"{"code":422,"msg":"User already registered"}"#), "User already registered");
    assert_eq!(error_message("<html>"), "request rejected");
}

#[test]
fn token_status_classification() {
    assert_eq!(check_token_status(200, "ok".into()).unwrap(), "ok");
    assert!(matches!(check_token_status(401, String::new()), Err(IdentityError::InvalidToken)));
    assert!(matches!(check_token_status(403, String::new()), Err(IdentityError::InvalidToken)));
    assert!(matches!(check_token_status(404, String::new()), Err(IdentityError::InvalidToken)));
    assert!(matches!(check_token_status(502, String::new()), Err(IdentityError::Response { status: 502, .. })));
}

#[test]
fn rejection_status_carries_message() {
    match check_rejection(400, r#"{"error_description":"Email not confirmed"}"#.into()) {
        Err(IdentityError::Rejected(msg)) => assert_eq!(msg, "Email not confirmed"),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(matches!(check_rejection(500, String::new()), Err(IdentityError::Response { status: 500, .. })));
}

#[test]
fn client_trims_trailing_slash() {
    let client = SupabaseClient::new(&SupabaseConfig {
        url: "https://xyz.supabase.co/".into(),
        anon_key: "anon".into(),
        request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
    })
    .unwrap();
    assert_eq!(client.url(USER_PATH), "https://xyz.supabase.co/auth/v1/user");
}

#[test]
fn refresh_uses_refresh_token_grant() {
    let client = SupabaseClient::new(&SupabaseConfig {
        url: "https://xyz.supabase.co".into(),
        anon_key: "anon".into(),
        request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
    })
    .unwrap();
    assert_eq!(
        client.url(REFRESH_PATH),
        "https://xyz.supabase.co/auth/v1/token?grant_type=refresh_token"
    );
}

#[test]
fn spent_refresh_token_is_rejected() {
    let body = r#"{"error":"invalid_grant","error_description":"Invalid Refresh Token: Already Used"}"#;
    match check_rejection(400, body.into()) {
        Err(IdentityError::Rejected(msg)) => assert_eq!(msg, "Invalid Refresh Token: Already Used"),
        other => panic!("unexpected: {other:?}"),
    }
}
