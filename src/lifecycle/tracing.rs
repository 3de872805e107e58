//! # Observability & Tracing
//!
//! [`setup_tracing`] installs a compact `tracing_subscriber::fmt` subscriber.
//! Verbosity comes from `RUST_LOG` and defaults to `info`.
//!
//! ```bash
//! RUST_LOG=debug service-config-manager --environment dev
//! RUST_LOG=service_config_manager::relational=debug service-config-manager --environment dev
//! ```
//!
//! Every service is processed inside a `service` span carrying its name and
//! kind, so a run reads like:
//!
//! ```text
//! INFO service{service="kv-store" kind=couchbase}: Found config file path=/config/kv/couchbase.yaml
//! WARN service{service="kv-store" kind=couchbase}: Backend not ready attempt=1 max_attempts=10 error=connection unavailable
//! INFO service{service="kv-store" kind=couchbase}: Backend ready attempt=2
//! INFO service{service="kv-store" kind=couchbase}: Configuration applied applied=3 unchanged=0
//! INFO Run complete processed=1 failed=0
//! ```
//!
//! `RUST_LOG=debug` adds the resolved connection targets (secrets redacted)
//! and every statement sent to a backend.

use tracing_subscriber::EnvFilter;

pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false) // Spans carry the service name instead
        .compact()
        .init();
}
