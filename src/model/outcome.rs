use std::fmt;
use std::process::ExitCode;
use std::time::Duration;

/// Whether one managed service reached its target state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => f.write_str("success"),
            Outcome::Failure(reason) => write!(f, "failure: {reason}"),
        }
    }
}

/// The recorded result of processing one managed service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub service_name: String,
    pub outcome: Outcome,
    pub duration: Duration,
}

impl OperationResult {
    pub fn success(service_name: impl Into<String>, duration: Duration) -> Self {
        Self {
            service_name: service_name.into(),
            outcome: Outcome::Success,
            duration,
        }
    }

    pub fn failure(service_name: impl Into<String>, reason: impl Into<String>, duration: Duration) -> Self {
        Self {
            service_name: service_name.into(),
            outcome: Outcome::Failure(reason.into()),
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Aggregate of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Services applied successfully.
    pub processed: usize,
    pub failed: usize,
    /// One entry per attempted service, in manifest order.
    pub results: Vec<OperationResult>,
}

impl RunSummary {
    pub fn record(&mut self, result: OperationResult) {
        if result.is_success() {
            self.processed += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    /// Records a failure for an entry that never produced a controller.
    pub fn record_rejected(&mut self) {
        self.failed += 1;
    }

    pub fn exit_outcome(&self) -> ExitOutcome {
        if self.failed == 0 {
            ExitOutcome::Success
        } else {
            ExitOutcome::Failure
        }
    }
}

/// Process-level result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    Failure,
}

impl ExitOutcome {
    pub const fn code(self) -> u8 {
        match self {
            ExitOutcome::Success => 0,
            ExitOutcome::Failure => 1,
        }
    }
}

impl From<ExitOutcome> for ExitCode {
    fn from(outcome: ExitOutcome) -> Self {
        ExitCode::from(outcome.code())
    }
}
