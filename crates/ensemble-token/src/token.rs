//! HS256 minting and verification of Ensemble chat tokens.
//!
//! # Key invariants
//! - The algorithm is pinned to HS256 in both directions.
//! - `aud` is always [`ENSEMBLE_AUDIENCE`] and is validated on verify.
//! - The signing key id travels either in the JWT header (`kid`) or as a claim,
//!   never both.
use crate::claims::{ChatClaims, ChatIdentity, ENSEMBLE_AUDIENCE};
use crate::keys::KeyRegistry;
use crate::{TokenError, TokenResult};
use jsonwebtoken::{Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);
/// Longest TTL a deployment may configure for chat tokens.
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Where the signing key id is carried in minted tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KidPlacement {
    /// `kid` in the JWT header so the verifier can pick among several keys.
    #[default]
    Header,
    /// `kid` as a payload claim, for single static secret setups.
    Claim,
}

impl std::str::FromStr for KidPlacement {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "header" => Ok(Self::Header),
            "claim" => Ok(Self::Claim),
            other => Err(format!("unknown kid placement: {other}")),
        }
    }
}

pub struct ChatTokenIssuer {
    ttl: Duration,
    placement: KidPlacement,
    keys: Arc<KeyRegistry>,
}

impl ChatTokenIssuer {
    pub fn new(ttl: Duration, keys: Arc<KeyRegistry>) -> Self {
        Self {
            ttl,
            placement: KidPlacement::Header,
            keys,
        }
    }

    pub fn with_kid_placement(mut self, placement: KidPlacement) -> Self {
        self.placement = placement;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn kid_placement(&self) -> KidPlacement {
        self.placement
    }

    /// Mint a token for `identity` issued now.
    pub fn mint(&self, identity: &ChatIdentity) -> TokenResult<String> {
        self.mint_at(identity, now_epoch_seconds())
    }

    /// Mint a token with an explicit `iat`; `exp` is `iat + ttl`.
    ///
    /// # Errors
    /// - `TokenError::InvalidTtl` if `iat + ttl` does not fit in an `i64`.
    /// - `TokenError::InvalidKey` if the current key is unusable.
    pub fn mint_at(&self, identity: &ChatIdentity, issued_at: i64) -> TokenResult<String> {
        let key = &self.keys.current;
        key.validate()?;
        let ttl_secs = self.ttl.as_secs();
        let expires_at = i64::try_from(ttl_secs)
            .ok()
            .and_then(|ttl| issued_at.checked_add(ttl))
            .ok_or(TokenError::InvalidTtl(ttl_secs))?;

        let claims = ChatClaims {
            sub: identity.subject.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            context: identity.context.clone(),
            iat: issued_at,
            exp: expires_at,
            aud: ENSEMBLE_AUDIENCE.to_string(),
            kid: match self.placement {
                KidPlacement::Claim => Some(key.kid.clone()),
                KidPlacement::Header => None,
            },
        };

        let mut header = Header::new(Algorithm::HS256);
        if self.placement == KidPlacement::Header {
            header.kid = Some(key.kid.clone());
        }
        Ok(jsonwebtoken::encode(&header, &claims, &key.encoding_key())?)
    }
}

pub struct ChatTokenVerifier {
    leeway: u64,
    keys: Arc<KeyRegistry>,
}

impl ChatTokenVerifier {
    pub fn new(leeway: u64, keys: Arc<KeyRegistry>) -> Self {
        Self { leeway, keys }
    }

    /// Verify signature, audience, and expiry, trying the header `kid` first.
    pub fn verify(&self, token: &str) -> TokenResult<ChatClaims> {
        let header = jsonwebtoken::decode_header(token)?;
        if header.alg != Algorithm::HS256 {
            return Err(TokenError::Jwt(jsonwebtoken::errors::Error::from(
                jsonwebtoken::errors::ErrorKind::InvalidAlgorithm,
            )));
        }
        if let Some(kid) = header.kid.as_deref()
            && self.keys.find(kid).is_none()
        {
            return Err(TokenError::UnknownKeyId(kid.to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[ENSEMBLE_AUDIENCE]);
        validation.leeway = self.leeway;
        validation
            .required_spec_claims
            .extend(["aud".to_string(), "iat".to_string()]);

        let mut last_err = None;
        for key in self.keys.verification_order(header.kid.as_deref()) {
            match jsonwebtoken::decode::<ChatClaims>(token, &key.decoding_key(), &validation) {
                Ok(data) => {
                    // A kid claim must name the key whose signature matched.
                    if let Some(claimed) = data.claims.kid.as_deref()
                        && claimed != key.kid
                    {
                        return Err(TokenError::KeyIdMismatch {
                            claim: claimed.to_string(),
                            key: key.kid.clone(),
                        });
                    }
                    return Ok(data.claims);
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(TokenError::Jwt(last_err.unwrap_or_else(|| {
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidToken)
        })))
    }
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs() as i64
}
