//! # API Shared
//!
//! Shared utilities and definitions for the MedPortal API.
//!
//! Contains:
//! - Request and response DTOs with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//! - Bearer token handling
//!
//! Used by `api-rest` and by the workspace binary.

pub mod auth;
pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
