use crate::auth::idp_registry::IdpIssuerConfig;
use crate::auth::policy::DomainAllowList;
use anyhow::{Context, Result, bail};
use ensemble_token::{DEFAULT_TOKEN_TTL, KeyRegistry, KidPlacement, MAX_TOKEN_TTL, SigningKey};
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4001;
pub const DEFAULT_METRICS_PORT: u16 = 9464;
pub const DEFAULT_FIREBASE_PROJECT_ID: &str = "ensembleapp-chat";
pub const DEFAULT_DEMO_SUBJECT: &str = "demo-user";
pub const DEFAULT_IDENTITY_LABEL: &str = "Firebase";
const DEFAULT_CLOCK_SKEW_SECS: u64 = 60;
const DEFAULT_JWKS_TTL_SECS: u64 = 3600;

/// How callers prove who they are before a token is minted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Bearer ID token verified against the configured issuers.
    #[default]
    #[serde(alias = "firebase")]
    Oidc,
    /// No caller authentication; every token is minted for the demo subject.
    /// Never use outside local demos.
    Anonymous,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Oidc => "oidc",
            AuthMode::Anonymous => "anonymous",
        }
    }
}

impl std::str::FromStr for AuthMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "oidc" | "firebase" => Ok(AuthMode::Oidc),
            "anonymous" => Ok(AuthMode::Anonymous),
            other => bail!("unknown auth mode: {other}"),
        }
    }
}

// Gateway configuration sourced from environment variables, optionally
// overridden by a YAML file. Built once at startup and never re-read.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    // HTTP listener for the token endpoint.
    pub bind_addr: SocketAddr,
    // Prometheus metrics listener.
    pub metrics_bind: SocketAddr,
    pub auth_mode: AuthMode,
    // Subject used for every token in anonymous mode.
    pub demo_subject: String,
    // Provider name shown in the "invalid or expired" 401 message.
    pub identity_label: String,
    // Trusted upstream issuers; Firebase for the configured project by default.
    pub issuers: Vec<IdpIssuerConfig>,
    pub oidc_allowed_algorithms: Vec<Algorithm>,
    pub clock_skew_seconds: u64,
    // TTL for cached JWKS and discovery documents.
    pub jwks_ttl: Duration,
    pub require_email_verified: bool,
    // None means unset, which is reported as a misconfiguration per request.
    pub allowed_domains: Option<DomainAllowList>,
    // None means ENSEMBLE_KEY_ID/ENSEMBLE_KEY_SECRET are not provisioned.
    pub signing_keys: Option<KeyRegistry>,
    pub kid_placement: KidPlacement,
    pub token_ttl: Duration,
    // Base URL of the Ensemble chat service, surfaced to clients via system info.
    pub downstream_base_url: Option<String>,
    // Allowed CORS origins; `*` allows any.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            metrics_bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_METRICS_PORT)),
            auth_mode: AuthMode::Oidc,
            demo_subject: DEFAULT_DEMO_SUBJECT.to_string(),
            identity_label: DEFAULT_IDENTITY_LABEL.to_string(),
            issuers: vec![IdpIssuerConfig::firebase(DEFAULT_FIREBASE_PROJECT_ID)],
            oidc_allowed_algorithms: vec![Algorithm::RS256],
            clock_skew_seconds: DEFAULT_CLOCK_SKEW_SECS,
            jwks_ttl: Duration::from_secs(DEFAULT_JWKS_TTL_SECS),
            require_email_verified: false,
            allowed_domains: None,
            signing_keys: None,
            kid_placement: KidPlacement::Header,
            token_ttl: DEFAULT_TOKEN_TTL,
            downstream_base_url: None,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Deserialize)]
struct KeyOverride {
    key_id: String,
    key_secret: String,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GatewayConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    auth_mode: Option<AuthMode>,
    demo_subject: Option<String>,
    identity_label: Option<String>,
    firebase_project_id: Option<String>,
    issuers: Option<Vec<IdpIssuerConfig>>,
    oidc_allowed_algorithms: Option<Vec<String>>,
    clock_skew_seconds: Option<u64>,
    jwks_ttl_secs: Option<u64>,
    require_email_verified: Option<bool>,
    allowed_domains: Option<Vec<String>>,
    signing_key: Option<KeyOverride>,
    previous_keys: Option<Vec<KeyOverride>>,
    kid_placement: Option<KidPlacement>,
    token_ttl_secs: Option<u64>,
    downstream_base_url: Option<String>,
    cors_allowed_origins: Option<Vec<String>>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // CHAT_TOKEN_BIND wins over the PORT convention used by hosting platforms.
        if let Some(bind) = non_empty_env("CHAT_TOKEN_BIND") {
            config.bind_addr = bind.parse().with_context(|| "parse CHAT_TOKEN_BIND")?;
        } else if let Some(port) = non_empty_env("PORT") {
            let port: u16 = port.parse().with_context(|| "parse PORT")?;
            config.bind_addr = SocketAddr::from(([0, 0, 0, 0], port));
        }
        if let Some(bind) = non_empty_env("CHAT_TOKEN_METRICS_BIND") {
            config.metrics_bind = bind
                .parse()
                .with_context(|| "parse CHAT_TOKEN_METRICS_BIND")?;
        }
        if let Some(mode) = non_empty_env("CHAT_TOKEN_AUTH_MODE") {
            config.auth_mode = mode.parse().with_context(|| "parse CHAT_TOKEN_AUTH_MODE")?;
        }
        if let Some(subject) = non_empty_env("CHAT_TOKEN_DEMO_SUBJECT") {
            config.demo_subject = subject;
        }
        if let Some(label) = non_empty_env("CHAT_TOKEN_IDENTITY_LABEL") {
            config.identity_label = label;
        }
        if let Some(project_id) = non_empty_env("FIREBASE_PROJECT_ID") {
            config.issuers = vec![IdpIssuerConfig::firebase(&project_id)];
        }
        if let Some(algs) = non_empty_env("CHAT_TOKEN_OIDC_ALLOWED_ALGS") {
            config.oidc_allowed_algorithms = parse_algorithms(algs.split(','))
                .with_context(|| "parse CHAT_TOKEN_OIDC_ALLOWED_ALGS")?;
        }
        if let Some(value) = non_empty_env("CHAT_TOKEN_CLOCK_SKEW_SECS") {
            config.clock_skew_seconds = value
                .parse()
                .with_context(|| "parse CHAT_TOKEN_CLOCK_SKEW_SECS")?;
        }
        if let Some(value) = non_empty_env("CHAT_TOKEN_JWKS_TTL_SECS") {
            let secs: u64 = value
                .parse()
                .with_context(|| "parse CHAT_TOKEN_JWKS_TTL_SECS")?;
            config.jwks_ttl = Duration::from_secs(secs);
        }
        if let Some(value) = non_empty_env("CHAT_TOKEN_REQUIRE_EMAIL_VERIFIED") {
            config.require_email_verified =
                parse_flag(&value).with_context(|| "parse CHAT_TOKEN_REQUIRE_EMAIL_VERIFIED")?;
        }
        config.allowed_domains = std::env::var("ALLOWED_DOMAINS")
            .ok()
            .and_then(|value| DomainAllowList::parse(&value));
        config.signing_keys = match (
            non_empty_env("ENSEMBLE_KEY_ID"),
            non_empty_env("ENSEMBLE_KEY_SECRET"),
        ) {
            (Some(kid), Some(secret)) => Some(KeyRegistry::new(SigningKey::new(kid, secret))),
            _ => None,
        };
        if let Some(value) = non_empty_env("ENSEMBLE_KID_PLACEMENT") {
            config.kid_placement = value
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| "parse ENSEMBLE_KID_PLACEMENT")?;
        }
        if let Some(value) = non_empty_env("ENSEMBLE_TOKEN_TTL_SECS") {
            config.token_ttl = parse_ttl(&value).with_context(|| "parse ENSEMBLE_TOKEN_TTL_SECS")?;
        }
        config.downstream_base_url = non_empty_env("ENSEMBLE_BASE_URL");
        if let Some(origins) = non_empty_env("CHAT_TOKEN_CORS_ORIGINS") {
            config.cors_allowed_origins = split_list(&origins);
        }
        Ok(config)
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Some(path) = non_empty_env("CHAT_TOKEN_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read CHAT_TOKEN_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: GatewayConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse gateway config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.auth_mode {
            self.auth_mode = value;
        }
        if let Some(value) = override_cfg.demo_subject {
            self.demo_subject = value;
        }
        if let Some(value) = override_cfg.identity_label {
            self.identity_label = value;
        }
        if let Some(project_id) = override_cfg.firebase_project_id {
            self.issuers = vec![IdpIssuerConfig::firebase(&project_id)];
        }
        // Explicit issuers replace the Firebase preset entirely.
        if let Some(issuers) = override_cfg.issuers {
            self.issuers = issuers;
        }
        if let Some(algs) = override_cfg.oidc_allowed_algorithms {
            self.oidc_allowed_algorithms =
                parse_algorithms(algs.iter()).with_context(|| "parse oidc_allowed_algorithms")?;
        }
        if let Some(value) = override_cfg.clock_skew_seconds {
            self.clock_skew_seconds = value;
        }
        if let Some(value) = override_cfg.jwks_ttl_secs {
            self.jwks_ttl = Duration::from_secs(value);
        }
        if let Some(value) = override_cfg.require_email_verified {
            self.require_email_verified = value;
        }
        if let Some(domains) = override_cfg.allowed_domains {
            self.allowed_domains = DomainAllowList::new(domains);
        }
        if let Some(key) = override_cfg.signing_key {
            self.signing_keys = Some(KeyRegistry::new(SigningKey::new(
                key.key_id,
                key.key_secret,
            )));
        }
        if let Some(previous) = override_cfg.previous_keys {
            let Some(registry) = self.signing_keys.take() else {
                bail!("previous_keys requires a current signing key");
            };
            let previous = previous
                .into_iter()
                .map(|key| SigningKey::new(key.key_id, key.key_secret))
                .collect();
            self.signing_keys = Some(registry.with_previous(previous));
        }
        if let Some(value) = override_cfg.kid_placement {
            self.kid_placement = value;
        }
        if let Some(value) = override_cfg.token_ttl_secs {
            self.token_ttl = bounded_ttl(value)?;
        }
        if let Some(value) = override_cfg.downstream_base_url {
            self.downstream_base_url = Some(value);
        }
        if let Some(value) = override_cfg.cors_allowed_origins {
            self.cors_allowed_origins = value;
        }
        Ok(())
    }

    /// Reject settings that can never produce a working gateway. Missing
    /// secrets or domains are not errors here; they surface per request.
    pub fn validate(&self) -> Result<()> {
        if self.auth_mode == AuthMode::Oidc {
            if self.issuers.is_empty() {
                bail!("at least one identity issuer is required in oidc mode");
            }
            if self.oidc_allowed_algorithms.is_empty() {
                bail!("no supported upstream algorithms configured");
            }
        }
        if let Some(keys) = &self.signing_keys {
            keys.validate().with_context(|| "validate signing keys")?;
        }
        bounded_ttl(self.token_ttl.as_secs()).with_context(|| "validate token ttl")?;
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn parse_ttl(value: &str) -> Result<Duration> {
    let secs: u64 = value.trim().parse()?;
    bounded_ttl(secs)
}

fn bounded_ttl(secs: u64) -> Result<Duration> {
    if secs == 0 {
        bail!("token ttl must be greater than zero");
    }
    if secs > MAX_TOKEN_TTL.as_secs() {
        bail!(
            "token ttl of {secs}s exceeds the maximum of {}s",
            MAX_TOKEN_TTL.as_secs()
        );
    }
    Ok(Duration::from_secs(secs))
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {other}"),
    }
}

fn parse_algorithms<I, S>(values: I) -> Result<Vec<Algorithm>>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    let mut algorithms = Vec::new();
    for value in values {
        let value = value.as_ref().trim();
        if value.is_empty() {
            continue;
        }
        let alg: Algorithm = value
            .parse()
            .with_context(|| format!("unknown algorithm {value}"))?;
        if !matches!(alg, Algorithm::RS256 | Algorithm::ES256) {
            bail!("algorithm {value} is not accepted for identity tokens");
        }
        algorithms.push(alg);
    }
    Ok(algorithms)
}
