//! Ensemble chat token primitives shared by the token gateway and consumers.
//!
//! # Purpose
//! Defines the downstream claim schema, the shared-secret key registry, and
//! HS256 issue/verify helpers for tokens consumed by the Ensemble chat backend.
//!
//! # How it fits
//! The token gateway mints tokens with [`ChatTokenIssuer`] after it has
//! authenticated and authorized a caller. Anything holding the same secrets can
//! check them with [`ChatTokenVerifier`].
//!
//! # Key invariants
//! - Tokens are always HS256; other algorithms are rejected on verify.
//! - `aud` is always [`ENSEMBLE_AUDIENCE`].
//! - `exp - iat` equals the issuer's configured TTL.
//! - Secrets never appear in `Debug` output.
//!
//! # Examples
//! ```rust
//! use ensemble_token::{ChatIdentity, ChatTokenIssuer, ChatTokenVerifier, KeyRegistry, SigningKey};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let keys = Arc::new(KeyRegistry::new(SigningKey::new("kid-1", "shared-secret")));
//! let issuer = ChatTokenIssuer::new(Duration::from_secs(3600), keys.clone());
//! let token = issuer.mint(&ChatIdentity::new("user-1")).expect("mint");
//!
//! let verifier = ChatTokenVerifier::new(0, keys);
//! let claims = verifier.verify(&token).expect("verify");
//! assert_eq!(claims.sub, "user-1");
//! assert_eq!(claims.exp - claims.iat, 3600);
//! ```

mod claims;
mod errors;
mod keys;
mod token;

pub use claims::{ChatClaims, ChatIdentity, ENSEMBLE_AUDIENCE};
pub use errors::{TokenError, TokenResult};
pub use keys::{KeyRegistry, KeySecret, SigningKey};
pub use token::{ChatTokenIssuer, ChatTokenVerifier, DEFAULT_TOKEN_TTL, KidPlacement, MAX_TOKEN_TTL};
