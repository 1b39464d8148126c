//! Smoke test for the storefront_auth server

use std::net::TcpListener;
use std::sync::Arc;

use storefront_auth::auth::{AuthDependencies, AuthService};
use storefront_auth::clock::SystemClock;
use storefront_auth::configuration::{SecuritySettings, TokenSettings};
use storefront_auth::startup::run;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let deps = AuthDependencies::in_memory(Arc::new(SystemClock), false);
    let tokens = TokenSettings {
        secret: "health-check-secret-key-at-least-32-chars".to_string(),
        session_ttl_seconds: 3600,
        issuer: "storefront-test".to_string(),
    };
    let security = SecuritySettings {
        bcrypt_cost: 4,
        ..SecuritySettings::default()
    };
    let auth = AuthService::new(deps, &tokens, &security).expect("Failed to build service");

    let server = run(listener, Arc::new(auth)).expect("Failed to create server");
    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "storefront_auth");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/does-not-exist", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}
