mod common;

use axum::{
    extract::FromRequestParts,
    http::{Request, StatusCode, request::Parts},
};
use chrono::{Duration, Utc};
use common::*;
use jsonwebtoken::{EncodingKey, Header, encode};
use tokio::test;
use villa_catalog::{
    auth::{self, AuthUser, Claims},
    config::{AppConfig, Env},
    models::Role,
};

fn parts_with(headers: &[(&str, &str)]) -> Parts {
    let mut builder = Request::builder().uri("/api/auth/profile");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(()).unwrap().into_parts().0
}

// --- TOKENS ---

#[test]
async fn test_issue_and_decode_token() {
    let config = AppConfig::default();
    let editor = user(EDITOR_ID, "editor", Role::Editor);

    let token = auth::issue_token(&editor, &config).unwrap();
    let claims = auth::decode_token(&token, &config).unwrap();

    assert_eq!(claims.sub, EDITOR_ID);
    assert_eq!(claims.role, Role::Editor);
    assert_eq!(
        claims.exp - claims.iat,
        (config.jwt_ttl_hours * 3600) as usize
    );
}

#[test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let config = AppConfig::default();
    let other = AppConfig {
        jwt_secret: "some-other-secret".to_string(),
        ..AppConfig::default()
    };
    let token = auth::issue_token(&user(ADMIN_ID, "admin", Role::Admin), &other).unwrap();

    let err = auth::decode_token(&token, &config).unwrap_err();

    assert_eq!(err.status(), StatusCode::FORBIDDEN);
    assert_eq!(err.to_string(), "Invalid or expired token");
}

#[test]
async fn test_expired_token_is_rejected() {
    let config = AppConfig::default();
    let past = Utc::now() - Duration::hours(2);
    let claims = Claims {
        sub: ADMIN_ID,
        role: Role::Admin,
        iat: (past - Duration::hours(1)).timestamp() as usize,
        exp: past.timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .unwrap();

    assert!(auth::decode_token(&token, &config).is_err());
}

// --- PASSWORDS ---

#[test]
async fn test_out_of_range_lifetime_is_an_error_not_a_panic() {
    let admin = user(ADMIN_ID, "admin", Role::Admin);

    for ttl in [i64::MAX / 1000, -(i64::MAX / 1000), 0, -1] {
        let config = AppConfig {
            jwt_ttl_hours: ttl,
            ..AppConfig::default()
        };
        let err = auth::issue_token(&admin, &config).unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR, "ttl {ttl}");
    }
}

#[test]
async fn test_password_hash_and_verify() {
    let hash = auth::hash_password("admin123").unwrap();

    assert!(hash.starts_with("$argon2"));
    assert!(auth::verify_password("admin123", &hash));
    assert!(!auth::verify_password("admin124", &hash));
    assert!(!auth::verify_password("admin123", "garbage"));
}

#[test]
async fn test_same_password_gets_distinct_salts() {
    let first = auth::hash_password("secret").unwrap();
    let second = auth::hash_password("secret").unwrap();
    assert_ne!(first, second);
}

// --- ROLE GATES ---

#[test]
async fn test_role_gates() {
    assert!(admin().require_staff().is_ok());
    assert!(admin().require_admin().is_ok());
    assert!(editor().require_staff().is_ok());
    assert_eq!(
        editor().require_admin().unwrap_err().status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        viewer().require_staff().unwrap_err().to_string(),
        "Admin/Editor access required"
    );
}

// --- EXTRACTOR ---

#[test]
async fn test_extractor_accepts_valid_bearer_token() {
    let repo = repo_with_accounts();
    let bearer = bearer_for(&repo.user(EDITOR_ID).unwrap());
    let state = test_state(repo);
    let mut parts = parts_with(&[("authorization", bearer.as_str())]);

    let auth_user = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap();

    assert_eq!(auth_user.id, EDITOR_ID);
    assert_eq!(auth_user.role, Role::Editor);
}

#[test]
async fn test_extractor_uses_stored_role_not_token_role() {
    let repo = repo_with_accounts();
    // Token minted while the account was still an admin.
    let mut stale = repo.user(VIEWER_ID).unwrap();
    stale.role = Role::Admin;
    let bearer = bearer_for(&stale);
    let state = test_state(repo);
    let mut parts = parts_with(&[("authorization", bearer.as_str())]);

    let auth_user = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap();

    assert_eq!(auth_user.role, Role::Viewer);
}

#[test]
async fn test_extractor_missing_token_is_401() {
    let state = test_state(repo_with_accounts());
    let mut parts = parts_with(&[]);

    let err = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(err.to_string(), "Access token required");
}

#[test]
async fn test_extractor_malformed_token_is_403() {
    let state = test_state(repo_with_accounts());
    let mut parts = parts_with(&[("authorization", "Bearer not.a.jwt")]);

    let err = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::FORBIDDEN);
}

#[test]
async fn test_extractor_rejects_inactive_or_deleted_user() {
    let repo = repo_with_accounts();
    let inactive = bearer_for(&repo.user(INACTIVE_ID).unwrap());
    let deleted = bearer_for(&user(uuid::Uuid::new_v4(), "ghost", Role::Admin));
    let state = test_state(repo);

    for bearer in [inactive, deleted] {
        let mut parts = parts_with(&[("authorization", bearer.as_str())]);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "User not found or inactive");
    }
}

#[test]
async fn test_local_header_bypass() {
    let state = test_state(repo_with_accounts());
    let admin_id = ADMIN_ID.to_string();
    let mut parts = parts_with(&[("x-user-id", admin_id.as_str())]);

    let auth_user = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap();

    assert_eq!(auth_user.id, ADMIN_ID);
    assert_eq!(auth_user.role, Role::Admin);
}

#[test]
async fn test_header_bypass_disabled_in_production() {
    let mut state = test_state(repo_with_accounts());
    state.config.env = Env::Production;
    let admin_id = ADMIN_ID.to_string();
    let mut parts = parts_with(&[("x-user-id", admin_id.as_str())]);

    let err = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}
