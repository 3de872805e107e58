//! Plain data types shared by the loader, the controllers and the orchestrator.

pub mod artifact;
pub mod outcome;
pub mod service;
pub mod target;

pub use artifact::*;
pub use outcome::*;
pub use service::*;
pub use target::*;
