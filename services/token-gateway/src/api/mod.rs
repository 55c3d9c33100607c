//! Gateway HTTP API module.
//!
//! # Purpose
//! Exposes shared error/payload types, system endpoints, and the OpenAPI
//! document. The token endpoint itself lives in [`crate::auth::issue`].
pub mod error;
pub mod openapi;
pub mod system;
pub mod types;
