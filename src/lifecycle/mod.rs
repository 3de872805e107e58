//! # Run Lifecycle & Orchestration
//!
//! Drives one configuration run from manifest to exit code.
//!
//! ## Flow
//!
//! 1. **Manifest**: read once through the [`Loader`](crate::loader::Loader).
//!    Invalid entries count as failures, unknown types are skipped.
//! 2. **Per service, in manifest order**: load artifacts, build the
//!    controller through a [`ControllerFactory`](crate::framework::ControllerFactory),
//!    wait for readiness, apply. Any error along the way, including a panic
//!    in the controller, becomes that service's `Failure`.
//! 3. **Summary**: counts and a health snapshot of every controller that came up are
//!    logged; the [`ExitOutcome`](crate::model::ExitOutcome) is `Failure` if
//!    any service failed.
//!
//! ```rust,ignore
//! let config = RunConfig::new("/config", "dev");
//! let mut manager = ConfigManager::new(config, BackendFactory::new("dev"));
//! let summary = manager.run().await?;
//! ```
//!
//! [`BackendFactory`] wires the real backend clients; tests use
//! [`MockFactory`](crate::framework::mock::MockFactory) instead.

pub mod factory;
pub mod orchestrator;
pub mod tracing;

pub use factory::BackendFactory;
pub use orchestrator::{run, run_with, ConfigManager, RunConfig};
pub use self::tracing::setup_tracing;
