use helpdesk_auth::domain::user::Role;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde_json::json;

mod common;

#[tokio::test]
async fn test_user_budget_then_block() {
    let app = common::TestApp::spawn().await;
    let user = app.seed_user(Role::Employee);
    let wrong = json!({ "email": user.email, "password": "wrong" });

    for i in 1..=5 {
        let resp = app.login_from("203.0.113.10", &wrong).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "Attempt {i} should be processed");
    }

    let resp = app.login_from("203.0.113.10", &wrong).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = resp.headers()[RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!(retry_after > 0);

    // The account stays blocked from another address, even with the right password.
    let right = json!({ "email": user.email, "password": common::PASSWORD });
    let resp = app.login_from("198.51.100.20", &right).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.headers().contains_key(RETRY_AFTER));
}

#[tokio::test]
async fn test_ip_isolation() {
    let mut config = common::get_test_config();
    config.rate_limit.login_ip_limit = 2;
    let app = common::TestApp::spawn_with_config(config).await;
    let ghost = json!({ "email": "nobody@helpdesk.test", "password": "x" });

    for _ in 0..2 {
        assert_eq!(app.login_from("1.1.1.1", &ghost).await.status(), StatusCode::UNAUTHORIZED);
    }
    assert_eq!(app.login_from("1.1.1.1", &ghost).await.status(), StatusCode::TOO_MANY_REQUESTS);

    assert_eq!(app.login_from("2.2.2.2", &ghost).await.status(), StatusCode::UNAUTHORIZED, "Other IPs are unaffected");
}

#[tokio::test]
async fn test_proxy_chain_uses_rightmost_untrusted_hop() {
    let mut config = common::get_test_config();
    config.rate_limit.login_ip_limit = 1;
    let app = common::TestApp::spawn_with_config(config).await;
    let ghost = json!({ "email": "nobody@helpdesk.test", "password": "x" });

    assert_eq!(app.login_from("9.9.9.9, 1.1.1.1, 2.2.2.2", &ghost).await.status(), StatusCode::UNAUTHORIZED);

    let resp = app.login_from("spoofed, 2.2.2.2", &ghost).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS, "Should block based on the rightmost untrusted IP");
}

#[tokio::test]
async fn test_disabled_limiter_never_throttles() {
    let mut config = common::get_test_config();
    config.rate_limit.enabled = false;
    let app = common::TestApp::spawn_with_config(config).await;
    let user = app.seed_user(Role::Employee);
    let wrong = json!({ "email": user.email, "password": "wrong" });

    for _ in 0..8 {
        assert_eq!(app.login(&wrong).await.status(), StatusCode::UNAUTHORIZED);
    }
    let right = json!({ "email": user.email, "password": common::PASSWORD });
    assert_eq!(app.login(&right).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_caller_errors_do_not_consume_budget() {
    let mut config = common::get_test_config();
    config.rate_limit.login_ip_limit = 1;
    let app = common::TestApp::spawn_with_config(config).await;
    let user = app.seed_user(Role::Employee);

    for _ in 0..3 {
        let resp = app.login_from("5.5.5.5", &json!({ "email": "", "password": "x" })).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    let right = json!({ "email": user.email, "password": common::PASSWORD });
    assert_eq!(app.login_from("5.5.5.5", &right).await.status(), StatusCode::OK);
}
