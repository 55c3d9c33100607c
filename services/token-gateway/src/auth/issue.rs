//! Chat token issuance endpoint handler.
//!
//! # Purpose
//! Verifies the caller's identity assertion, applies the email-domain policy,
//! and mints a short-lived Ensemble chat token.
//!
//! # Flow
//! 1. Bearer extraction (401 on failure).
//! 2. Upstream verification through [`crate::auth::oidc::UpstreamOidcValidator`]
//!    (401; 500 when the issuer's keys cannot be fetched).
//! 3. Domain policy and optional `email_verified` check (500 when unset, 403).
//! 4. Signing credentials present (500 when unset).
//! 5. Mint and return `{ "token" }`.
//!
//! Anonymous mode skips steps 1 to 3.
use crate::api::error::{
    ApiError, api_forbidden, api_internal, api_misconfigured, api_unauthenticated,
};
use crate::api::types::{ChatTokenRequest, ChatTokenResponse};
use crate::app::AppState;
use crate::auth::oidc::{OidcError, VerifiedIdentity};
use crate::auth::policy::PolicyError;
use crate::config::AuthMode;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use ensemble_token::ChatIdentity;
use std::time::Instant;

pub const MISSING_AUTHORIZATION_MESSAGE: &str = "Missing or invalid authorization header";
pub const ACCESS_DENIED_MESSAGE: &str = "Access denied.";
pub const MISSING_POLICY_MESSAGE: &str = "ALLOWED_DOMAINS not set";
pub const MISSING_CREDENTIALS_MESSAGE: &str = "ENSEMBLE_KEY_ID/ENSEMBLE_KEY_SECRET not set";

#[utoipa::path(
    post,
    path = "/chat-token",
    tag = "auth",
    request_body(content = ChatTokenRequest, description = "Optional context forwarded in the token"),
    responses(
        (status = 200, description = "Chat token minted", body = ChatTokenResponse),
        (status = 401, description = "Missing or invalid identity assertion", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Email domain not allowed", body = crate::api::types::ErrorResponse),
        (status = 500, description = "Gateway misconfigured or internal error", body = crate::api::types::ErrorResponse)
    )
)]
pub async fn issue_chat_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<ChatTokenRequest>>,
) -> Result<Json<ChatTokenResponse>, ApiError> {
    let result = issue(&state, &headers, body.and_then(|Json(request)| request.context)).await;
    let outcome = match &result {
        Ok(_) => "issued",
        Err(err) => err.body.code.as_str(),
    };
    metrics::counter!("chat_token_requests_total", "outcome" => outcome.to_string()).increment(1);
    result.map(Json)
}

async fn issue(
    state: &AppState,
    headers: &HeaderMap,
    context: Option<serde_json::Map<String, serde_json::Value>>,
) -> Result<ChatTokenResponse, ApiError> {
    let identity = match state.config.auth_mode {
        AuthMode::Anonymous => ChatIdentity::new(state.config.demo_subject.clone()),
        AuthMode::Oidc => {
            let verified = authenticate(state, headers).await?;
            authorize(state, &verified)?;
            chat_identity(verified)
        }
    };

    let issuer = state
        .token_issuer
        .as_ref()
        .ok_or_else(|| api_misconfigured(MISSING_CREDENTIALS_MESSAGE))?;

    let identity = match context {
        Some(context) => identity.with_context(context),
        None => identity,
    };
    let token = issuer
        .mint(&identity)
        .map_err(|err| api_internal("failed to mint chat token", &err))?;
    tracing::debug!(subject = %identity.subject, "chat token issued");
    Ok(ChatTokenResponse { token })
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<VerifiedIdentity, ApiError> {
    let bearer =
        extract_bearer(headers).ok_or_else(|| api_unauthenticated(MISSING_AUTHORIZATION_MESSAGE))?;

    let started = Instant::now();
    let verified = state
        .oidc_validator
        .validate(bearer, &state.config.issuers)
        .await;
    metrics::histogram!("chat_token_verify_seconds").record(started.elapsed().as_secs_f64());

    verified.map_err(|err| match err {
        // The assertion may be fine; the IdP is unreachable.
        OidcError::Http(_) => api_internal("failed to fetch issuer signing keys", &err),
        err => {
            tracing::info!(reason = err.reason(), error = %err, "identity assertion rejected");
            api_unauthenticated(&invalid_token_message(&state.config.identity_label))
        }
    })
}

fn authorize(state: &AppState, verified: &VerifiedIdentity) -> Result<(), ApiError> {
    let policy = state
        .config
        .allowed_domains
        .as_ref()
        .ok_or_else(|| api_misconfigured(MISSING_POLICY_MESSAGE))?;

    let decision = policy.authorize(verified.email.as_deref()).and_then(|()| {
        if state.config.require_email_verified && !verified.email_verified {
            return Err(PolicyError::EmailNotVerified);
        }
        Ok(())
    });
    decision.map_err(|err| {
        tracing::info!(subject = %verified.subject, error = %err, "chat token denied by policy");
        api_forbidden(ACCESS_DENIED_MESSAGE)
    })
}

fn chat_identity(verified: VerifiedIdentity) -> ChatIdentity {
    let mut identity = ChatIdentity::new(verified.subject);
    if let Some(email) = verified.email {
        identity = identity.with_email(email);
    }
    if let Some(name) = verified.name {
        identity = identity.with_name(name);
    }
    identity
}

fn invalid_token_message(label: &str) -> String {
    format!("Invalid or expired {label} token")
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?;
    let value = value.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
