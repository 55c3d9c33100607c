//! Identity provider issuer configuration models.
//!
//! # Purpose
//! Defines trusted issuer settings and claim mappings used by OIDC validation,
//! plus the Firebase Authentication preset the gateway uses by default.
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Public signing keys for Firebase Authentication ID tokens.
pub const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ClaimMappings {
    pub subject_claim: String,
    pub email_claim: String,
    pub email_verified_claim: String,
    pub name_claim: String,
    /// Firebase-style `auth_time`; checked not to be in the future when set.
    pub auth_time_claim: Option<String>,
}

impl Default for ClaimMappings {
    fn default() -> Self {
        Self {
            subject_claim: "sub".to_string(),
            email_claim: "email".to_string(),
            email_verified_claim: "email_verified".to_string(),
            name_claim: "name".to_string(),
            auth_time_claim: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IdpIssuerConfig {
    pub issuer: String,
    pub audiences: Vec<String>,
    #[serde(default)]
    pub discovery_url: Option<String>,
    #[serde(default)]
    pub jwks_url: Option<String>,
    #[serde(default)]
    pub claim_mappings: ClaimMappings,
}

impl IdpIssuerConfig {
    /// Issuer settings for Firebase Authentication ID tokens of `project_id`.
    ///
    /// Firebase signs with RS256, sets `iss` to the securetoken URL for the
    /// project and `aud` to the bare project id.
    pub fn firebase(project_id: &str) -> Self {
        Self {
            issuer: format!("{FIREBASE_ISSUER_PREFIX}{project_id}"),
            audiences: vec![project_id.to_string()],
            discovery_url: None,
            jwks_url: Some(FIREBASE_JWKS_URL.to_string()),
            claim_mappings: ClaimMappings {
                auth_time_claim: Some("auth_time".to_string()),
                ..ClaimMappings::default()
            },
        }
    }
}
