//! # API Shared
//!
//! Shared utilities and definitions for the clinic APIs.
//!
//! Contains:
//! - Request/response types (`wire` module), documented for OpenAPI
//! - Shared services like `HealthService`
//! - Bearer-token header parsing (usable by any HTTP front end)
//!
//! Used by `clinic-core`, `api-rest` and the CLI for common functionality.

pub mod auth;
pub mod health;
pub mod wire;

pub use health::HealthService;
pub use wire::*;
