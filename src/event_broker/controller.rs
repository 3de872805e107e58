use super::declared_topics;
use crate::clients::TopicAdmin;
use crate::framework::{ApplySummary, Controller, ControllerError, HealthCheck, HealthStatus};
use crate::model::{ConfigArtifact, ManagedServiceDefinition};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Creates the topics declared in `redpanda.yaml` that the broker lacks.
pub struct EventBrokerController<A> {
    service: ManagedServiceDefinition,
    admin: A,
    artifacts: Vec<ConfigArtifact>,
    environment: String,
}

impl<A: TopicAdmin> EventBrokerController<A> {
    pub fn new(
        service: ManagedServiceDefinition,
        admin: A,
        artifacts: Vec<ConfigArtifact>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            service,
            admin,
            artifacts,
            environment: environment.into(),
        }
    }

    pub fn admin(&self) -> &A {
        &self.admin
    }
}

#[async_trait]
impl<A: TopicAdmin> HealthCheck for EventBrokerController<A> {
    async fn health_check(&self) -> Option<HealthStatus> {
        self.admin.health_check().await
    }
}

#[async_trait]
impl<A: TopicAdmin> Controller for EventBrokerController<A> {
    fn service(&self) -> &ManagedServiceDefinition {
        &self.service
    }

    async fn probe(&self) -> Result<(), ControllerError> {
        Ok(self.admin.ping().await?)
    }

    #[instrument(skip(self), fields(service = %self.service.name))]
    async fn apply_artifacts(&self) -> Result<ApplySummary, ControllerError> {
        let Some(content) = self.artifacts.iter().find_map(ConfigArtifact::as_structured) else {
            warn!("No redpanda config found");
            return Ok(ApplySummary::default());
        };
        let topics = declared_topics(content, &self.environment)?;
        if topics.is_empty() {
            warn!("No topics declared");
            return Ok(ApplySummary::default());
        }

        let existing: HashSet<String> = self.admin.topics().await?.into_iter().collect();

        let mut summary = ApplySummary::default();
        for topic in &topics {
            if existing.contains(&topic.name) {
                debug!(topic = %topic.name, "Topic exists");
                summary.unchanged += 1;
                continue;
            }
            self.admin.create_topic(topic).await?;
            info!(
                topic = %topic.name,
                partitions = topic.partitions,
                replication_factor = topic.replication_factor,
                "Created topic"
            );
            summary.applied += 1;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_broker::{EventBrokerError, TopicSpec};
    use crate::model::BackendKind;
    use crate::settings::Settings;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeBroker {
        topics: Mutex<Vec<String>>,
        created: Mutex<Vec<TopicSpec>>,
        reachable: bool,
    }

    impl HealthCheck for FakeBroker {}

    #[async_trait]
    impl TopicAdmin for FakeBroker {
        async fn topics(&self) -> Result<Vec<String>, EventBrokerError> {
            if !self.reachable {
                return Err(EventBrokerError::Timeout(Duration::from_secs(1)));
            }
            Ok(self.topics.lock().unwrap().clone())
        }

        async fn create_topic(&self, topic: &TopicSpec) -> Result<(), EventBrokerError> {
            self.topics.lock().unwrap().push(topic.name.clone());
            self.created.lock().unwrap().push(topic.clone());
            Ok(())
        }
    }

    fn controller(broker: FakeBroker, yaml: Option<&str>) -> EventBrokerController<FakeBroker> {
        let artifacts = yaml
            .map(|y| vec![ConfigArtifact::StructuredConfig(serde_yaml::from_str::<Settings>(y).unwrap())])
            .unwrap_or_default();
        EventBrokerController::new(
            ManagedServiceDefinition::new("events", BackendKind::EventBroker, "bus"),
            broker,
            artifacts,
            "dev",
        )
    }

    fn reachable(existing: &[&str]) -> FakeBroker {
        FakeBroker {
            topics: Mutex::new(existing.iter().map(|t| t.to_string()).collect()),
            reachable: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn creates_only_missing_topics() {
        let controller = controller(
            reachable(&["orders"]),
            Some("topics: [{name: orders}, {name: payments, partitions: 4}]"),
        );

        let summary = controller.apply_artifacts().await.unwrap();
        assert_eq!(summary, ApplySummary::new(1, 1));
        let created = controller.admin().created.lock().unwrap().clone();
        assert_eq!(
            created,
            [TopicSpec { name: "payments".into(), partitions: 4, replication_factor: 1 }]
        );
    }

    #[tokio::test]
    async fn second_apply_changes_nothing() {
        let controller = controller(reachable(&[]), Some("topics: [{name: orders}]"));
        assert_eq!(controller.apply_artifacts().await.unwrap(), ApplySummary::new(1, 0));
        assert_eq!(controller.apply_artifacts().await.unwrap(), ApplySummary::new(0, 1));
    }

    #[tokio::test]
    async fn missing_config_is_a_successful_no_op() {
        let controller = controller(reachable(&[]), None);
        assert!(controller.apply().await.is_success());
    }

    #[tokio::test]
    async fn invalid_config_fails_without_contacting_the_broker() {
        let controller = controller(FakeBroker::default(), Some("topics: [{name: a, partitions: 0}]"));
        let err = controller.apply_artifacts().await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidArtifact(_)));
    }

    #[tokio::test]
    async fn probe_reports_an_unreachable_broker() {
        let controller = controller(FakeBroker::default(), None);
        assert!(controller.probe().await.is_err());
    }
}
