use helpdesk_auth::domain::user::{Role, UserStatus};
use reqwest::StatusCode;
use serde_json::{Value, json};

mod common;

#[tokio::test]
async fn test_unknown_identity_matches_wrong_password() {
    let app = common::TestApp::spawn().await;
    let user = app.seed_user(Role::Employee);

    let unknown = app.login(&json!({ "email": "ghost@helpdesk.test", "password": "x" })).await;
    let wrong = app.login(&json!({ "email": user.email, "password": "x" })).await;

    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let unknown: Value = unknown.json().await.unwrap();
    let wrong: Value = wrong.json().await.unwrap();
    assert_eq!(unknown, wrong);
}

#[tokio::test]
async fn test_inactive_account() {
    let app = common::TestApp::spawn().await;
    let user = app.seed_user(Role::Employee);
    app.users.set_status(user.id, UserStatus::Inactive);

    let resp = app.login(&json!({ "email": user.email, "password": common::PASSWORD })).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(app.refresh_tokens.is_empty());
}

#[tokio::test]
async fn test_deleted_user_token_is_not_found() {
    let app = common::TestApp::spawn().await;
    let user = app.seed_user(Role::Employee);
    let session = app.login_ok(&user, false).await;
    app.users.soft_delete(user.id);

    let resp = app.me(session["accessToken"].as_str().unwrap()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app.refresh(session["refreshToken"].as_str().unwrap()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_requires_valid_bearer() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.get(format!("{}/v1/auth/me", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(app.me("garbage").await.status(), StatusCode::UNAUTHORIZED);

    // A refresh secret is not an access token.
    let user = app.seed_user(Role::Employee);
    let session = app.login_ok(&user, false).await;
    assert_eq!(app.me(session["refreshToken"].as_str().unwrap()).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/v1/auth/login", app.server_url))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/v1/auth/refresh", app.server_url))
        .header("x-request-id", "req-abc-123")
        .json(&json!({ "refreshToken": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "req-abc-123");

    let resp = app.refresh("nope").await;
    assert!(resp.headers().contains_key("x-request-id"));
}
