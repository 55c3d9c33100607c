//! Upstream ID token validation with cached discovery and JWKS fetching.
//!
//! # Purpose
//! Validate inbound identity assertions (Firebase or any OIDC provider) against
//! configured issuers using cached discovery documents and JWKS with TTL-based
//! refresh.
//!
//! # Architectural role
//! This is the boundary between end-user identity and the gateway: nothing
//! downstream sees claims that did not pass through [`UpstreamOidcValidator::validate`].
//!
//! # Key invariants
//! - Only algorithms in the configured allowlist are accepted (RS256 by
//!   default, which Firebase uses). HS* is never accepted here because the
//!   gateway's own shared secrets must not validate upstream identities.
//! - Issuer and audience claims are validated against configuration.
//! - `iat` (and `auth_time` when mapped) must not be in the future.
//! - JWKS and discovery caches are time-bounded and refreshed on demand, and
//!   once more when a token names an unknown `kid`.
//!
//! # Concurrency model
//! Caches live in `DashMap` so concurrent requests share them without a global
//! lock. Fetching JWKS is the only await point.
//!
//! # Security model
//! Claims are decoded without verification only to locate the issuer; every
//! value returned to callers comes from the verified token.
use crate::auth::idp_registry::IdpIssuerConfig;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use dashmap::DashMap;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_ALLOWED_ALGORITHMS: &[Algorithm] = &[Algorithm::RS256];

/// Validator for upstream bearer tokens with cached discovery/JWKS.
#[derive(Debug, Clone)]
pub struct UpstreamOidcValidator {
    client: reqwest::Client,
    jwks_cache: Arc<DashMap<String, CachedJwks>>,
    discovery_cache: Arc<DashMap<String, CachedDiscovery>>,
    jwks_ttl: Duration,
    discovery_ttl: Duration,
    clock_skew_seconds: u64,
    allowed_algorithms: Arc<[Algorithm]>,
}

/// Identity extracted from a verified upstream token.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    pub issuer: String,
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
}

/// Errors returned during upstream token validation.
///
/// Messages never include token contents.
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("missing issuer")]
    MissingIssuer,
    #[error("issuer not allowed")]
    IssuerNotAllowed,
    #[error("missing subject")]
    MissingSubject,
    #[error("missing key id")]
    MissingKeyId,
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("invalid jwk: {0}")]
    InvalidJwk(String),
    #[error("jwks key not found")]
    JwksKeyNotFound,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("invalid claim: {0}")]
    InvalidClaim(String),
}

impl OidcError {
    /// Short label for metrics; stable across releases.
    pub fn reason(&self) -> &'static str {
        match self {
            OidcError::MissingIssuer => "missing_issuer",
            OidcError::IssuerNotAllowed => "issuer_not_allowed",
            OidcError::MissingSubject => "missing_subject",
            OidcError::MissingKeyId => "missing_kid",
            OidcError::UnsupportedAlgorithm => "unsupported_alg",
            OidcError::InvalidJwk(_) => "invalid_jwk",
            OidcError::JwksKeyNotFound => "unknown_kid",
            OidcError::Http(_) => "jwks_fetch",
            OidcError::Jwt(_) => "jwt",
            OidcError::InvalidClaim(_) => "invalid_claim",
        }
    }
}

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
struct CachedDiscovery {
    jwks_url: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    jwks_uri: String,
}

impl Default for UpstreamOidcValidator {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600), Duration::from_secs(3600), 60)
    }
}

impl UpstreamOidcValidator {
    /// Create a validator accepting [`DEFAULT_ALLOWED_ALGORITHMS`].
    ///
    /// # Examples
    /// ```rust
    /// use token_gateway::auth::oidc::UpstreamOidcValidator;
    /// use std::time::Duration;
    ///
    /// let validator = UpstreamOidcValidator::new(Duration::from_secs(600), Duration::from_secs(600), 30);
    /// ```
    pub fn new(jwks_ttl: Duration, discovery_ttl: Duration, clock_skew_seconds: u64) -> Self {
        Self::new_with_allowed_algorithms(
            jwks_ttl,
            discovery_ttl,
            clock_skew_seconds,
            DEFAULT_ALLOWED_ALGORITHMS.to_vec(),
        )
    }

    /// Create a validator with an explicit algorithm allowlist.
    ///
    /// Only asymmetric RS256 and ES256 are meaningful here; anything else in
    /// the list is ignored so a misconfiguration cannot admit HS256.
    pub fn new_with_allowed_algorithms(
        jwks_ttl: Duration,
        discovery_ttl: Duration,
        clock_skew_seconds: u64,
        allowed_algorithms: Vec<Algorithm>,
    ) -> Self {
        let allowed: Vec<Algorithm> = allowed_algorithms
            .into_iter()
            .filter(|alg| matches!(alg, Algorithm::RS256 | Algorithm::ES256))
            .collect();
        Self {
            client: reqwest::Client::new(),
            jwks_cache: Arc::new(DashMap::new()),
            discovery_cache: Arc::new(DashMap::new()),
            jwks_ttl,
            discovery_ttl,
            clock_skew_seconds,
            allowed_algorithms: allowed.into(),
        }
    }

    pub fn allowed_algorithms(&self) -> &[Algorithm] {
        &self.allowed_algorithms
    }

    /// Validate an upstream bearer token against configured issuers.
    ///
    /// # Errors
    /// - `OidcError::UnsupportedAlgorithm` if the header algorithm is not allowed.
    /// - `OidcError::IssuerNotAllowed` if `iss` is not configured.
    /// - `OidcError::MissingKeyId` if the header lacks a `kid`.
    /// - `OidcError::JwksKeyNotFound` if the key is absent even after a refresh.
    /// - `OidcError::InvalidJwk` if the JWK does not match the algorithm.
    /// - `OidcError::InvalidClaim` for missing/future `iat` or future `auth_time`.
    /// - `OidcError::MissingSubject` if the mapped subject is absent or empty.
    /// - `OidcError::Jwt` for signature, expiry, issuer, or audience failures.
    /// - `OidcError::Http` if discovery or the JWKS endpoint cannot be fetched.
    pub async fn validate(
        &self,
        token: &str,
        issuers: &[IdpIssuerConfig],
    ) -> Result<VerifiedIdentity, OidcError> {
        // Step 1: Check header algorithm before any network work.
        let header = decode_header(token)?;
        if !self.allowed_algorithms.contains(&header.alg) {
            return Err(OidcError::UnsupportedAlgorithm);
        }
        let kid = header.kid.as_deref().ok_or(OidcError::MissingKeyId)?;

        // Step 2: Peek at the unverified issuer only to pick the issuer config.
        let unsafe_claims = decode_unverified_claims(token)?;
        let issuer = extract_string_claim(&unsafe_claims, "iss").ok_or(OidcError::MissingIssuer)?;
        let issuer_cfg = issuers
            .iter()
            .find(|cfg| cfg.issuer == issuer)
            .ok_or(OidcError::IssuerNotAllowed)?;

        // Step 3: Resolve the signing key, refreshing JWKS once on a kid miss
        // so key rotation at the IdP does not cause an outage.
        let jwks_url = self.resolve_jwks_url(&issuer, issuer_cfg).await?;
        let jwks = self.get_jwks(&jwks_url).await?;
        let decoding_key = match find_jwk(&jwks, kid) {
            Some(key) => {
                ensure_jwk_matches_algorithm(key, header.alg)?;
                DecodingKey::from_jwk(key)?
            }
            None => {
                let refreshed = self.refresh_jwks(&jwks_url).await?;
                let key = find_jwk(&refreshed, kid).ok_or(OidcError::JwksKeyNotFound)?;
                ensure_jwk_matches_algorithm(key, header.alg)?;
                DecodingKey::from_jwk(key)?
            }
        };

        // Step 4: Verify signature, expiry, issuer, and audience.
        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[issuer_cfg.issuer.as_str()]);
        validation.set_audience(&issuer_cfg.audiences);
        validation
            .required_spec_claims
            .extend(["iss".to_string(), "aud".to_string()]);
        validation.leeway = self.clock_skew_seconds;
        let token = decode::<Value>(token, &decoding_key, &validation)?;

        validate_iat(&token.claims, self.clock_skew_seconds)?;
        if let Some(claim) = issuer_cfg.claim_mappings.auth_time_claim.as_deref() {
            validate_auth_time(&token.claims, claim, self.clock_skew_seconds)?;
        }

        // Step 5: Map the verified claims onto the gateway identity.
        let mappings = &issuer_cfg.claim_mappings;
        let subject = extract_string_claim(&token.claims, &mappings.subject_claim)
            .filter(|value| !value.is_empty())
            .ok_or(OidcError::MissingSubject)?;
        let email = extract_string_claim(&token.claims, &mappings.email_claim);
        let email_verified = token
            .claims
            .get(&mappings.email_verified_claim)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let name = extract_string_claim(&token.claims, &mappings.name_claim);

        Ok(VerifiedIdentity {
            issuer,
            subject,
            email,
            email_verified,
            name,
        })
    }

    async fn resolve_jwks_url(
        &self,
        issuer: &str,
        issuer_cfg: &IdpIssuerConfig,
    ) -> Result<String, OidcError> {
        if let Some(url) = &issuer_cfg.jwks_url {
            return Ok(url.to_string());
        }
        let discovery_url = issuer_cfg.discovery_url.clone().unwrap_or_else(|| {
            format!(
                "{}/.well-known/openid-configuration",
                issuer.trim_end_matches('/')
            )
        });

        if let Some(entry) = self.discovery_cache.get(&discovery_url)
            && entry.expires_at > Instant::now()
        {
            return Ok(entry.jwks_url.clone());
        }

        let doc: DiscoveryDocument = self
            .client
            .get(&discovery_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        self.discovery_cache.insert(
            discovery_url,
            CachedDiscovery {
                jwks_url: doc.jwks_uri.clone(),
                expires_at: Instant::now() + self.discovery_ttl,
            },
        );
        Ok(doc.jwks_uri)
    }

    async fn get_jwks(&self, jwks_url: &str) -> Result<JwkSet, OidcError> {
        if let Some(entry) = self.jwks_cache.get(jwks_url)
            && entry.expires_at > Instant::now()
        {
            return Ok(entry.jwks.clone());
        }
        self.refresh_jwks(jwks_url).await
    }

    async fn refresh_jwks(&self, jwks_url: &str) -> Result<JwkSet, OidcError> {
        tracing::debug!(%jwks_url, "refreshing jwks");
        let jwks: JwkSet = self
            .client
            .get(jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        self.jwks_cache.insert(
            jwks_url.to_string(),
            CachedJwks {
                jwks: jwks.clone(),
                expires_at: Instant::now() + self.jwks_ttl,
            },
        );
        Ok(jwks)
    }
}

fn ensure_jwk_matches_algorithm(
    jwk: &jsonwebtoken::jwk::Jwk,
    alg: Algorithm,
) -> Result<(), OidcError> {
    // Firebase publishes `alg` on every key; a key without it is not trusted.
    let key_alg = jwk
        .common
        .key_algorithm
        .ok_or_else(|| OidcError::InvalidJwk("missing alg".to_string()))?;
    match (key_alg, alg) {
        (KeyAlgorithm::RS256, Algorithm::RS256) => {}
        (KeyAlgorithm::ES256, Algorithm::ES256) => {}
        _ => return Err(OidcError::InvalidJwk("alg mismatch".to_string())),
    }
    match (&jwk.algorithm, alg) {
        (AlgorithmParameters::RSA(_), Algorithm::RS256) => Ok(()),
        (AlgorithmParameters::EllipticCurve(params), Algorithm::ES256) => {
            if params.curve != EllipticCurve::P256 {
                return Err(OidcError::InvalidJwk("unexpected EC curve".to_string()));
            }
            Ok(())
        }
        _ => Err(OidcError::InvalidJwk("kty mismatch".to_string())),
    }
}

fn find_jwk<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a jsonwebtoken::jwk::Jwk> {
    jwks.keys
        .iter()
        .find(|key| key.common.key_id.as_deref() == Some(kid))
}

fn decode_unverified_claims(token: &str) -> Result<Value, OidcError> {
    let mut parts = token.split('.');
    let _header = parts.next();
    let payload = parts
        .next()
        .ok_or_else(|| OidcError::InvalidClaim("token format".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| OidcError::InvalidClaim("token payload".to_string()))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| OidcError::InvalidClaim(format!("token payload: {err}")))
}

fn extract_string_claim(claims: &Value, name: &str) -> Option<String> {
    claims
        .get(name)
        .and_then(|value| value.as_str())
        .map(|value| value.to_string())
}

fn validate_iat(claims: &Value, leeway_seconds: u64) -> Result<(), OidcError> {
    let iat = claims
        .get("iat")
        .and_then(|value| value.as_i64())
        .ok_or_else(|| OidcError::InvalidClaim("iat".to_string()))?;
    if iat > Utc::now().timestamp() + leeway_seconds as i64 {
        return Err(OidcError::InvalidClaim("iat in future".to_string()));
    }
    Ok(())
}

fn validate_auth_time(claims: &Value, name: &str, leeway_seconds: u64) -> Result<(), OidcError> {
    let auth_time = claims
        .get(name)
        .and_then(|value| value.as_i64())
        .ok_or_else(|| OidcError::InvalidClaim(name.to_string()))?;
    if auth_time > Utc::now().timestamp() + leeway_seconds as i64 {
        return Err(OidcError::InvalidClaim(format!("{name} in future")));
    }
    Ok(())
}
