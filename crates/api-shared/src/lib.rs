//! # API Shared
//!
//! Shared definitions for the clinic HTTP API.
//!
//! Contains:
//! - JSON wire types (`wire` module), documented for OpenAPI with `utoipa`
//! - Shared services like `HealthService`
//! - Bearer credential parsing
//!
//! Used by `api-rest` and the `clinic-run` binary.

pub mod auth;
pub mod health;
pub mod wire;

pub use auth::{bearer_token, AuthHeaderError};
pub use health::HealthService;
pub use wire::*;
