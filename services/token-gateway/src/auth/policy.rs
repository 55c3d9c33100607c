//! Email-domain authorization policy.
//!
//! # Purpose
//! Decide whether an authenticated identity may receive a chat token, based on
//! the domain of its email address.
//!
//! # Key invariants
//! - Domains are stored trimmed and lower-cased; comparison is exact on the
//!   normalized form (no subdomain matching).
//! - An allow-list is never empty. "No domains configured" is represented by
//!   the absence of a [`DomainAllowList`], which callers treat as a server
//!   misconfiguration rather than "allow everyone".
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("email address is missing or has no domain")]
    MissingDomain,
    #[error("domain {0} is not allowed")]
    DomainNotAllowed(String),
    #[error("email address is not verified")]
    EmailNotVerified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainAllowList {
    domains: BTreeSet<String>,
}

impl DomainAllowList {
    /// Build from individual entries; returns `None` when nothing usable is left.
    pub fn new<I, S>(domains: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains: BTreeSet<String> = domains
            .into_iter()
            .map(|domain| domain.as_ref().trim().to_ascii_lowercase())
            .filter(|domain| !domain.is_empty())
            .collect();
        if domains.is_empty() {
            return None;
        }
        Some(Self { domains })
    }

    /// Parse a comma-separated list such as `ALLOWED_DOMAINS`.
    pub fn parse(value: &str) -> Option<Self> {
        Self::new(value.split(','))
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(&domain.trim().to_ascii_lowercase())
    }

    /// Check that `email` belongs to an allowed domain.
    pub fn authorize(&self, email: Option<&str>) -> Result<(), PolicyError> {
        let domain = email
            .and_then(email_domain)
            .ok_or(PolicyError::MissingDomain)?;
        if !self.domains.contains(&domain) {
            return Err(PolicyError::DomainNotAllowed(domain));
        }
        Ok(())
    }
}

/// Lower-cased text after the `@` of an email address.
///
/// Returns `None` when there is no `@`, nothing after it, or more than one `@`.
pub fn email_domain(email: &str) -> Option<String> {
    let (local, domain) = email.trim().split_once('@')?;
    let domain = domain.trim();
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(domain.to_ascii_lowercase())
}
