//! HTTP API request/response types.
//!
//! # Purpose
//! Defines shared payload shapes for the gateway REST API and OpenAPI schema
//! generation.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Optional body of a chat token request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ChatTokenRequest {
    /// Free-form key/value context forwarded to the chat backend in the token.
    #[schema(value_type = Option<Object>)]
    #[serde(default)]
    pub context: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatTokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable message; clients surface it as-is.
    pub error: String,
    /// Stable machine-readable category.
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SystemInfo {
    pub service: String,
    pub version: String,
    pub auth_mode: String,
    pub audience: String,
    pub token_ttl_secs: u64,
    pub kid_placement: String,
    pub downstream_base_url: Option<String>,
    pub signing_configured: bool,
    pub domain_policy_configured: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
}
