mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::read_json;
use std::time::Duration;
use token_gateway::app::{AppState, build_router};
use token_gateway::auth::policy::DomainAllowList;
use token_gateway::config::{AuthMode, GatewayConfig};
use tower::ServiceExt;

async fn get(config: GatewayConfig, path: &str) -> (StatusCode, serde_json::Value) {
    let app = build_router(AppState::from_config(config));
    let response = app
        .oneshot(
            Request::builder()
                .uri(path)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    (status, read_json(response).await)
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = get(GatewayConfig::default(), "/v1/system/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn info_reports_unconfigured_gateway() {
    let (status, body) = get(GatewayConfig::default(), "/v1/system/info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "token-gateway");
    assert_eq!(body["auth_mode"], "oidc");
    assert_eq!(body["audience"], "ensembleapp.ai");
    assert_eq!(body["token_ttl_secs"], 3600);
    assert_eq!(body["kid_placement"], "header");
    assert_eq!(body["signing_configured"], false);
    assert_eq!(body["domain_policy_configured"], false);
    assert!(body["downstream_base_url"].is_null());
}

#[tokio::test]
async fn info_reports_configuration_without_secrets() {
    let config = GatewayConfig {
        auth_mode: AuthMode::Anonymous,
        allowed_domains: DomainAllowList::parse("example.com"),
        signing_keys: Some(common::signing_keys()),
        token_ttl: Duration::from_secs(900),
        downstream_base_url: Some("https://chat.ensembleapp.ai".to_string()),
        ..GatewayConfig::default()
    };
    let (status, body) = get(config, "/v1/system/info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["auth_mode"], "anonymous");
    assert_eq!(body["token_ttl_secs"], 900);
    assert_eq!(body["signing_configured"], true);
    assert_eq!(body["domain_policy_configured"], true);
    assert_eq!(body["downstream_base_url"], "https://chat.ensembleapp.ai");

    let rendered = body.to_string();
    assert!(!rendered.contains(common::ENSEMBLE_SECRET));
    assert!(!rendered.contains(common::ENSEMBLE_KID));
}

#[tokio::test]
async fn openapi_lists_chat_token_path() {
    let (status, body) = get(GatewayConfig::default(), "/v1/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/chat-token"]["post"].is_object());
}
