//! Authentication Tests
//!
//! Covers sign-up, sign-in, token rotation and protected route authorization.

mod common;

use axum::http::StatusCode;
use common::{app, DEFAULT_PASSWORD};
use serde_json::json;

// ===========================================================================
// Sign Up
// ===========================================================================

#[tokio::test]
async fn signup_creates_profile_and_tokens() {
    let app = app().await;

    let resp = app
        .post_json(
            "/v1/auth/signup",
            json!({ "email": "New@Example.com", "password": DEFAULT_PASSWORD, "full_name": "  Ada  " }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["profile"]["email"], "new@example.com");
    assert_eq!(body["profile"]["full_name"], "Ada");
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert!(body["access_expires_at"].is_string());
    assert!(body["refresh_expires_at"].is_string());
}

#[tokio::test]
async fn signup_duplicate_email_conflicts() {
    let app = app().await;
    let user = app.create_user("dup").await;

    let resp = app
        .post_json(
            "/v1/auth/signup",
            json!({ "email": user.email.to_uppercase(), "password": DEFAULT_PASSWORD, "full_name": "Other" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "email already registered");
}

#[tokio::test]
async fn signup_short_password() {
    let app = app().await;

    let resp = app
        .post_json(
            "/v1/auth/signup",
            json!({ "email": "short@example.com", "password": "short", "full_name": "Shorty" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "password must be at least 8 characters");
}

#[tokio::test]
async fn signup_requires_full_name() {
    let app = app().await;

    let resp = app
        .post_json(
            "/v1/auth/signup",
            json!({ "email": "noname@example.com", "password": DEFAULT_PASSWORD, "full_name": "   " }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "full_name is required");
}

// ===========================================================================
// Sign In
// ===========================================================================

#[tokio::test]
async fn signin_valid_credentials() {
    let app = app().await;
    let user = app.create_user("signin_valid").await;

    let resp = app
        .post_json(
            "/v1/auth/signin",
            json!({ "email": user.email, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["profile"]["id"], user.id.to_string());
    assert!(body["access_token"].is_string());
}

#[tokio::test]
async fn signin_invalid_password() {
    let app = app().await;
    let user = app.create_user("signin_badpw").await;

    let resp = app
        .post_json(
            "/v1/auth/signin",
            json!({ "email": user.email, "password": "wrong_password" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid credentials");
}

#[tokio::test]
async fn signin_unknown_user_same_message() {
    let app = app().await;

    let resp = app
        .post_json(
            "/v1/auth/signin",
            json!({ "email": "nobody@example.com", "password": "whatever123" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid credentials");
}

#[tokio::test]
async fn signin_empty_email() {
    let app = app().await;

    let resp = app
        .post_json(
            "/v1/auth/signin",
            json!({ "email": "", "password": "somepassword" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "email and password are required");
}

#[tokio::test]
async fn signin_password_too_long() {
    let app = app().await;

    let resp = app
        .post_json(
            "/v1/auth/signin",
            json!({ "email": "someone@example.com", "password": "a".repeat(150) }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "password must be at most 128 characters");
}

// ===========================================================================
// Token Lifecycle
// ===========================================================================

#[tokio::test]
async fn refresh_rotates_tokens() {
    let app = app().await;
    let user = app.create_user("refresh_valid").await;

    let resp = app
        .post_json(
            "/v1/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_ne!(body["access_token"].as_str().unwrap(), user.access_token);
    assert_ne!(body["refresh_token"].as_str().unwrap(), user.refresh_token);
    assert_eq!(app.store.refresh_token_count(user.id).await, 1);

    // The rotated-out token is spent.
    let resp = app
        .post_json(
            "/v1/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid refresh token");
}

#[tokio::test]
async fn refresh_malformed_token() {
    let app = app().await;

    let resp = app
        .post_json(
            "/v1/auth/refresh",
            json!({ "refresh_token": "this-is-not-a-valid-token" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid refresh token");
}

#[tokio::test]
async fn refresh_empty_token() {
    let app = app().await;

    let resp = app
        .post_json("/v1/auth/refresh", json!({ "refresh_token": "" }), None)
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "refresh_token is required");
}

#[tokio::test]
async fn signout_revokes_refresh_token() {
    let app = app().await;
    let user = app.create_user("signout").await;

    let resp = app
        .post_json(
            "/v1/auth/signout",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(app.store.refresh_token_count(user.id).await, 0);

    let resp = app
        .post_json(
            "/v1/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    // Second sign-out with the same token is rejected.
    let resp = app
        .post_json(
            "/v1/auth/signout",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid refresh token");
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let app = app().await;
    let user = app.create_user("wrong_kind").await;

    let resp = app
        .post_json(
            "/v1/auth/refresh",
            json!({ "refresh_token": user.access_token }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Protected Routes
// ===========================================================================

#[tokio::test]
async fn me_returns_current_profile() {
    let app = app().await;
    let user = app.create_user("me").await;

    let resp = app.get("/v1/auth/me", Some(&user.access_token)).await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["id"], user.id.to_string());
    assert_eq!(body["email"], user.email);
    assert_eq!(body["full_name"], user.full_name);
}

#[tokio::test]
async fn me_without_token() {
    let app = app().await;

    let resp = app.get("/v1/auth/me", None).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "missing Authorization header");
}

#[tokio::test]
async fn me_with_refresh_token_rejected() {
    let app = app().await;
    let user = app.create_user("me_refresh").await;

    let resp = app.get("/v1/auth/me", Some(&user.refresh_token)).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid token");
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app().await;

    let resp = app.get("/v1/health", None).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
}
