//! Gateway HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! State is derived once from [`GatewayConfig`]; handlers never read the
//! environment.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::auth;
use crate::auth::oidc::UpstreamOidcValidator;
use crate::config::GatewayConfig;
use crate::observability;
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use ensemble_token::ChatTokenIssuer;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub oidc_validator: UpstreamOidcValidator,
    /// `None` until `ENSEMBLE_KEY_ID`/`ENSEMBLE_KEY_SECRET` are provisioned.
    pub token_issuer: Option<Arc<ChatTokenIssuer>>,
}

impl AppState {
    pub fn from_config(config: GatewayConfig) -> Self {
        let oidc_validator = UpstreamOidcValidator::new_with_allowed_algorithms(
            config.jwks_ttl,
            config.jwks_ttl,
            config.clock_skew_seconds,
            config.oidc_allowed_algorithms.clone(),
        );
        let token_issuer = config.signing_keys.clone().map(|keys| {
            Arc::new(
                ChatTokenIssuer::new(config.token_ttl, Arc::new(keys))
                    .with_kid_placement(config.kid_placement),
            )
        });
        Self {
            config: Arc::new(config),
            oidc_validator,
            token_issuer,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri().path(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });
    let cors_layer = build_cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        .route(
            "/chat-token",
            axum::routing::post(auth::issue::issue_chat_token),
        )
        .route(
            "/api/chat-token",
            axum::routing::post(auth::issue::issue_chat_token),
        )
        .route(
            "/v1/system/info",
            axum::routing::get(api::system::system_info),
        )
        .route(
            "/v1/system/health",
            axum::routing::get(api::system::system_health),
        )
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs").url("/v1/openapi.json", ApiDoc::openapi()),
        )
        .layer(cors_layer)
        .layer(trace_layer)
        .with_state(state)
}

/// `*` anywhere in the list allows any origin; otherwise only the listed
/// origins are allowed. Unparsable entries are skipped with a warning.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
