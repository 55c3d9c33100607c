//! Gateway authentication and authorization modules.
//!
//! # Purpose
//! Groups upstream ID token validation, issuer presets, the email-domain
//! policy, and the chat token issuance handler.
pub mod idp_registry;
pub mod issue;
pub mod oidc;
pub mod policy;
