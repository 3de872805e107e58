//! # Mock Framework
//!
//! Utilities for testing the orchestrator without live backends.
//!
//! Register a [`MockController`] per service with a [`MockFactory`], queue the
//! probe and apply results you expect, then call [`MockController::verify`].

use super::{ApplySummary, Controller, ControllerError, ControllerFactory, HealthCheck, HealthStatus};
use crate::model::{ConfigArtifact, ManagedServiceDefinition, TargetError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Represents an expected call to the mock controller.
enum Expectation {
    Probe(Result<(), String>),
    Apply(Result<ApplySummary, String>),
}

/// A controller with expectation tracking for fluent testing.
///
/// # Example
/// ```ignore
/// let mock = MockController::new(service);
/// mock.expect_probe().times(2).return_err("connection refused");
/// mock.expect_probe().return_ok();
/// mock.expect_apply().return_ok(ApplySummary::new(1, 0));
///
/// // Hand `mock` to a MockFactory and run...
/// mock.verify(); // Ensures all expectations were met
/// ```
pub struct MockController {
    service: ManagedServiceDefinition,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    health: Option<HealthStatus>,
    probe_calls: AtomicUsize,
    apply_calls: AtomicUsize,
}

impl MockController {
    /// Creates a new mock controller with no expectations.
    pub fn new(service: ManagedServiceDefinition) -> Self {
        Self {
            service,
            expectations: Arc::new(Mutex::new(VecDeque::new())),
            health: None,
            probe_calls: AtomicUsize::new(0),
            apply_calls: AtomicUsize::new(0),
        }
    }

    /// Makes the mock report `status` from its health check.
    pub fn with_health(mut self, status: HealthStatus) -> Self {
        self.health = Some(status);
        self
    }

    /// Expects a `probe` call.
    pub fn expect_probe(&self) -> ProbeExpectationBuilder {
        ProbeExpectationBuilder {
            times: 1,
            expectations: self.expectations.clone(),
        }
    }

    /// Expects an `apply_artifacts` call.
    pub fn expect_apply(&self) -> ApplyExpectationBuilder {
        ApplyExpectationBuilder {
            expectations: self.expectations.clone(),
        }
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let exps = self.expectations.lock().unwrap();
        if !exps.is_empty() {
            panic!(
                "Not all expectations were met for {}. {} remaining",
                self.service.name,
                exps.len()
            );
        }
    }

    fn next(&self) -> Option<Expectation> {
        self.expectations.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl HealthCheck for MockController {
    async fn health_check(&self) -> Option<HealthStatus> {
        self.health.clone()
    }
}

#[async_trait]
impl Controller for MockController {
    fn service(&self) -> &ManagedServiceDefinition {
        &self.service
    }

    async fn probe(&self) -> Result<(), ControllerError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        match self.next() {
            Some(Expectation::Probe(response)) => response.map_err(|e| ControllerError::Backend(e.into())),
            _ => panic!("Unexpected probe for {}", self.service.name),
        }
    }

    async fn apply_artifacts(&self) -> Result<ApplySummary, ControllerError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        match self.next() {
            Some(Expectation::Apply(response)) => response.map_err(|e| ControllerError::Backend(e.into())),
            _ => panic!("Unexpected apply for {}", self.service.name),
        }
    }
}

/// Builder for `probe` expectations.
pub struct ProbeExpectationBuilder {
    times: usize,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl ProbeExpectationBuilder {
    /// Repeats the expectation `n` times.
    pub fn times(mut self, n: usize) -> Self {
        self.times = n;
        self
    }

    /// Sets the expectation to report the backend as reachable.
    pub fn return_ok(self) {
        self.push(Ok(()));
    }

    /// Sets the expectation to report the backend as unreachable.
    pub fn return_err(self, error: impl Into<String>) {
        self.push(Err(error.into()));
    }

    fn push(self, response: Result<(), String>) {
        let mut exps = self.expectations.lock().unwrap();
        for _ in 0..self.times {
            exps.push_back(Expectation::Probe(response.clone()));
        }
    }
}

/// Builder for `apply_artifacts` expectations.
pub struct ApplyExpectationBuilder {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl ApplyExpectationBuilder {
    /// Sets the expectation to return a successful result.
    pub fn return_ok(self, summary: ApplySummary) {
        let mut exps = self.expectations.lock().unwrap();
        exps.push_back(Expectation::Apply(Ok(summary)));
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: impl Into<String>) {
        let mut exps = self.expectations.lock().unwrap();
        exps.push_back(Expectation::Apply(Err(error.into())));
    }
}

/// A factory handing out registered [`MockController`]s by service name.
///
/// Building a service with no registered mock fails the way a service with
/// no connection variables would.
#[derive(Default)]
pub struct MockFactory {
    controllers: HashMap<String, Arc<MockController>>,
    built: Mutex<Vec<(String, Vec<ConfigArtifact>)>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `controller` under its service name.
    pub fn with_controller(mut self, controller: Arc<MockController>) -> Self {
        self.controllers.insert(controller.service.name.clone(), controller);
        self
    }

    /// Names of the services built so far, in build order.
    pub fn built(&self) -> Vec<String> {
        self.built.lock().unwrap().iter().map(|(name, _)| name.clone()).collect()
    }

    /// Artifacts passed when `name` was built.
    pub fn artifacts_for(&self, name: &str) -> Option<Vec<ConfigArtifact>> {
        self.built
            .lock()
            .unwrap()
            .iter()
            .find(|(built, _)| built == name)
            .map(|(_, artifacts)| artifacts.clone())
    }
}

impl ControllerFactory for MockFactory {
    fn build(
        &self,
        service: &ManagedServiceDefinition,
        artifacts: Vec<ConfigArtifact>,
    ) -> Result<Arc<dyn Controller>, ControllerError> {
        self.built.lock().unwrap().push((service.name.clone(), artifacts));
        match self.controllers.get(&service.name) {
            Some(controller) => Ok(controller.clone()),
            None => Err(ControllerError::Target(TargetError::MissingVariable(vec![format!(
                "{}_HOST",
                service.env_prefix()
            )]))),
        }
    }
}
