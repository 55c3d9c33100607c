//! Shared-secret signing keys for Ensemble chat tokens.
//!
//! # Purpose
//! Hold the `(kid, secret)` pairs issued by the Ensemble admin dashboard. The
//! current key signs new tokens; previous keys only verify tokens minted before
//! a rotation.
//!
//! # Key invariants
//! - Key ids and secrets are never empty.
//! - Key ids are unique within a registry.
//! - Secret bytes never show up in `Debug` output or error messages.
use crate::{TokenError, TokenResult};
use jsonwebtoken::{DecodingKey, EncodingKey};
use std::fmt;

/// Secret bytes of a signing key with a redacting `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct KeySecret(String);

impl KeySecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for KeySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeySecret(<redacted>)")
    }
}

impl From<String> for KeySecret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone)]
pub struct SigningKey {
    pub kid: String,
    pub secret: KeySecret,
}

impl SigningKey {
    pub fn new(kid: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            kid: kid.into(),
            secret: KeySecret::new(secret),
        }
    }

    pub fn validate(&self) -> TokenResult<()> {
        if self.kid.trim().is_empty() {
            return Err(TokenError::InvalidKey("empty key id".to_string()));
        }
        if self.secret.is_empty() {
            return Err(TokenError::InvalidKey(format!(
                "empty secret for key {}",
                self.kid
            )));
        }
        Ok(())
    }

    pub(crate) fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.secret.expose().as_bytes())
    }

    pub(crate) fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.secret.expose().as_bytes())
    }
}

/// Current and previous signing keys.
#[derive(Debug, Clone)]
pub struct KeyRegistry {
    pub current: SigningKey,
    pub previous: Vec<SigningKey>,
}

impl KeyRegistry {
    pub fn new(current: SigningKey) -> Self {
        Self {
            current,
            previous: Vec::new(),
        }
    }

    pub fn with_previous(mut self, previous: Vec<SigningKey>) -> Self {
        self.previous = previous;
        self
    }

    /// Check every key and reject duplicate key ids.
    pub fn validate(&self) -> TokenResult<()> {
        let mut seen = std::collections::HashSet::new();
        for key in self.all_keys() {
            key.validate()?;
            if !seen.insert(key.kid.as_str()) {
                return Err(TokenError::InvalidKey(format!(
                    "duplicate key id {}",
                    key.kid
                )));
            }
        }
        Ok(())
    }

    /// Current key first, then previous keys in rotation order.
    pub fn all_keys(&self) -> impl Iterator<Item = &SigningKey> {
        std::iter::once(&self.current).chain(self.previous.iter())
    }

    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        self.all_keys().find(|key| key.kid == kid)
    }

    /// Keys ordered for verification: the key named by `kid` first (when
    /// known), then every other key.
    pub(crate) fn verification_order(&self, kid: Option<&str>) -> Vec<&SigningKey> {
        let mut ordered = Vec::with_capacity(1 + self.previous.len());
        if let Some(found) = kid.and_then(|kid| self.find(kid)) {
            ordered.push(found);
            ordered.extend(self.all_keys().filter(|key| key.kid != found.kid));
        } else {
            ordered.extend(self.all_keys());
        }
        ordered
    }
}
