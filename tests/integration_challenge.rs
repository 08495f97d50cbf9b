use helpdesk_auth::domain::user::Role;
use reqwest::StatusCode;
use serde_json::json;
use std::sync::Arc;

mod common;

use common::{ChallengeMode, StubChallenge};

fn challenge_config() -> helpdesk_auth::config::Config {
    let mut config = common::get_test_config();
    config.challenge.enabled = true;
    config
}

#[tokio::test]
async fn test_challenge_gate() {
    let provider = StubChallenge::new(ChallengeMode::Pass);
    let app = common::TestApp::spawn_with(challenge_config(), Some(Arc::clone(&provider))).await;
    let user = app.seed_user(Role::Employee);

    let resp = app.login(&json!({ "email": user.email, "password": common::PASSWORD })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "Missing token is a caller error");
    assert_eq!(provider.calls(), 0);

    let resp = app
        .login(&json!({ "email": user.email, "password": common::PASSWORD, "challengeToken": "robot" }))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(app.audit.find("login_challenge_rejected").is_some());

    let resp = app
        .login(&json!({ "email": user.email, "password": common::PASSWORD, "challengeToken": "human" }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_rejections_count_against_ip() {
    let mut config = challenge_config();
    config.rate_limit.login_ip_limit = 2;
    let app = common::TestApp::spawn_with(config, Some(StubChallenge::new(ChallengeMode::Reject))).await;
    let body = json!({ "email": "any@helpdesk.test", "password": "x", "challengeToken": "t" });

    for _ in 0..2 {
        assert_eq!(app.login_from("7.7.7.7", &body).await.status(), StatusCode::UNAUTHORIZED);
    }
    assert_eq!(app.login_from("7.7.7.7", &body).await.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_verifier_outage_is_service_unavailable() {
    let mut config = challenge_config();
    config.rate_limit.login_ip_limit = 1;
    let app = common::TestApp::spawn_with(config, Some(StubChallenge::new(ChallengeMode::Unreachable))).await;
    let body = json!({ "email": "any@helpdesk.test", "password": "x", "challengeToken": "t" });

    for _ in 0..3 {
        assert_eq!(app.login_from("8.8.8.8", &body).await.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

#[tokio::test]
async fn test_skip_overrides_enabled() {
    let mut config = challenge_config();
    config.challenge.skip = true;
    let provider = StubChallenge::new(ChallengeMode::Reject);
    let app = common::TestApp::spawn_with(config, Some(Arc::clone(&provider))).await;
    let user = app.seed_user(Role::Employee);

    let resp = app.login(&json!({ "email": user.email, "password": common::PASSWORD })).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(provider.calls(), 0);
}
