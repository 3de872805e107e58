#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Service Config Manager
//!
//! > **Startup-time configuration for a multi-service deployment.**
//!
//! Reads a manifest of managed services and brings each backend into the
//! state its config directory declares: Couchbase scopes and collections,
//! Redpanda topics, PostgreSQL scripts. Runs once, in manifest order, and
//! exits non-zero if any service could not be configured.
//!
//! ## 🏗️ Design
//!
//! ### One controller per backend kind
//! Every backend is driven through the same [`Controller`](framework::Controller)
//! contract: `probe` until ready, then `apply_artifacts`. The shared parts
//! (retrying readiness, timing and logging an apply) live in default trait
//! methods, so a backend only implements what is specific to it.
//!
//! ### Drivers behind traits
//! Controllers are generic over small driver traits ([`clients`]) rather than
//! over concrete clients. Production wires the real Couchbase, Redpanda and
//! PostgreSQL clients; tests plug in in-memory fakes.
//!
//! ### Failures stay local
//! A missing env var, a malformed YAML file, a backend that never comes up
//! or a rejected statement fails *that* service only. The orchestrator records
//! it and moves on. Only an unreadable manifest aborts the run.
//!
//! ### Observability
//! `tracing` everywhere with structured fields, and a span per service. See
//! [`lifecycle::tracing`].
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Data ([`model`], [`settings`])
//! Service definitions, connection targets, artifacts, outcomes, and the
//! three-layer settings merge.
//!
//! ### 2. The Input ([`loader`])
//! Parses the manifest and discovers each service's artifacts.
//!
//! ### 3. The Engine ([`framework`])
//! The [`Controller`](framework::Controller) trait, its error type, the
//! health registry and the [`mock`](framework::mock) module.
//!
//! ### 4. The Backends ([`document_store`], [`event_broker`], [`relational`])
//! One controller per backend kind, with its own error type and artifact
//! format. The clients they drive live in [`clients`].
//!
//! ### 5. The Orchestrator ([`lifecycle`])
//! [`ConfigManager`](lifecycle::ConfigManager) runs the manifest end to end.
//!
//! ### 6. Data Access ([`repository`])
//! A generic record repository for services that keep documents in the
//! collections this tool creates.

pub mod clients;
pub mod document_store;
pub mod event_broker;
pub mod framework;
pub mod lifecycle;
pub mod loader;
pub mod model;
pub mod relational;
pub mod repository;
pub mod settings;
