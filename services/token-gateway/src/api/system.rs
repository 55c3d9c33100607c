//! System/health API handlers.
//!
//! # Purpose and responsibility
//! Lightweight endpoints for health checks and for clients that need to discover the
//! gateway's token settings (audience, TTL, downstream base URL).
//!
//! # Security considerations
//! - Only booleans describe secrets and policy; no key ids or domains leak.
use crate::api::types::{HealthStatus, SystemInfo};
use crate::app::AppState;
use axum::Json;
use axum::extract::State;
use ensemble_token::{ENSEMBLE_AUDIENCE, KidPlacement};

#[utoipa::path(
    get,
    path = "/v1/system/info",
    tag = "system",
    responses(
        (status = 200, description = "Gateway identity and token settings", body = SystemInfo)
    )
)]
/// Return the gateway's token settings, derived from startup configuration.
pub(crate) async fn system_info(State(state): State<AppState>) -> Json<SystemInfo> {
    let config = &state.config;
    Json(SystemInfo {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        auth_mode: config.auth_mode.as_str().to_string(),
        audience: ENSEMBLE_AUDIENCE.to_string(),
        token_ttl_secs: config.token_ttl.as_secs(),
        kid_placement: match config.kid_placement {
            KidPlacement::Header => "header".to_string(),
            KidPlacement::Claim => "claim".to_string(),
        },
        downstream_base_url: config.downstream_base_url.clone(),
        signing_configured: state.token_issuer.is_some(),
        domain_policy_configured: config.allowed_domains.is_some(),
    })
}

#[utoipa::path(
    get,
    path = "/v1/system/health",
    tag = "system",
    responses(
        (status = 200, description = "Gateway health", body = HealthStatus)
    )
)]
/// Liveness check. The gateway holds no backing store, so reaching the
/// handler is the whole check.
pub(crate) async fn system_health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
    })
}
