//! Chat token gateway library crate.
//!
//! # Purpose
//! Exposes the gateway's HTTP surface, auth pipeline, configuration, and
//! observability wiring for use by the binary and integration tests.
pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod observability;
