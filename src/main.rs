//! # Service Config Manager
//!
//! Command-line entry point. Every flag can also be set through the
//! environment variable named in its help, and a `.env` file in the working
//! directory is loaded first when present.
//!
//! ```bash
//! ENVIRONMENT=dev service-config-manager --config-root ./config
//! ```
//!
//! Exits `0` when every managed service was configured and `1` otherwise.

use clap::error::ErrorKind;
use clap::Parser;
use service_config_manager::lifecycle::{run_with, setup_tracing, RunConfig};
use service_config_manager::loader::DEFAULT_MANIFEST_PATH;
use service_config_manager::model::{ExitOutcome, ReadinessPolicy};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, info_span, Instrument};

/// Applies managed-service configuration at startup
#[derive(Debug, Parser)]
#[command(name = "service-config-manager", version, about)]
struct Cli {
    /// Directory holding the manifest and every service's config directory
    #[arg(long, env = "CONFIG_ROOT", default_value = "/config")]
    config_root: PathBuf,

    /// Deployment environment used to select per-environment settings
    #[arg(long, env = "ENVIRONMENT")]
    environment: String,

    /// Readiness probes per service before giving up
    #[arg(long, env = "READINESS_MAX_ATTEMPTS", default_value_t = ReadinessPolicy::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Seconds between readiness probes
    #[arg(long, env = "READINESS_RETRY_DELAY_SECS", default_value_t = 5.0)]
    retry_delay_secs: f64,

    /// Manifest location, relative to the config root unless absolute
    #[arg(long, env = "MANIFEST_PATH", default_value = DEFAULT_MANIFEST_PATH)]
    manifest: PathBuf,
}

impl Cli {
    fn run_config(&self) -> Result<RunConfig, String> {
        let delay = Duration::try_from_secs_f64(self.retry_delay_secs)
            .map_err(|e| format!("invalid --retry-delay-secs {}: {e}", self.retry_delay_secs))?;
        Ok(RunConfig::new(&self.config_root, &self.environment)
            .with_manifest_path(&self.manifest)
            .with_default_readiness(ReadinessPolicy::new(self.max_attempts, delay)))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    setup_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitOutcome::Failure.into();
        }
    };
    let config = match cli.run_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitOutcome::Failure.into();
        }
    };

    info!(
        config_root = %config.config_root.display(),
        environment = %config.environment,
        "Starting service configuration"
    );
    let span = info_span!("run", environment = %config.environment);
    let outcome = run_with(config).instrument(span).await;

    match outcome {
        ExitOutcome::Success => info!("All services configured"),
        ExitOutcome::Failure => error!("One or more services failed"),
    }
    outcome.into()
}
