//! Backend controller framework.
//!
//! This module provides the building blocks shared by every backend variant.
//!
//! # Main Components
//!
//! - [`Controller`] - Trait each backend variant implements (readiness + apply)
//! - [`ControllerFactory`] - Builds the controller for a manifest entry
//! - [`ControllerError`] - Common error type funnelled into run results
//! - [`HealthRegistry`] - Explicit name-to-handle registry of health checks
//!
//! # Testing
//!
//! See [`mock`] module for utilities to test the orchestrator without backends.

pub mod controller;
pub mod error;
pub mod health;
pub mod mock;

pub use controller::{ApplySummary, Controller, ControllerFactory};
pub use error::ControllerError;
pub use health::{HealthCheck, HealthRegistry, HealthReport, HealthStatus, OverallHealth};
