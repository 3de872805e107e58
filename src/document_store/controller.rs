use super::declared_scopes;
use crate::clients::BucketAdmin;
use crate::framework::{ApplySummary, Controller, ControllerError, HealthCheck, HealthStatus};
use crate::model::{ConfigArtifact, ManagedServiceDefinition};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

/// Creates the scopes and collections declared in `couchbase.yaml` that the
/// bucket lacks, and their primary indexes when requested.
pub struct DocumentStoreController<A> {
    service: ManagedServiceDefinition,
    admin: A,
    artifacts: Vec<ConfigArtifact>,
    environment: String,
}

impl<A: BucketAdmin> DocumentStoreController<A> {
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
impl<A: BucketAdmin> HealthCheck for DocumentStoreController<A> {
    async fn health_check(&self) -> Option<HealthStatus> {
        self.admin.health_check().await
    }
}

#[async_trait]
impl<A: BucketAdmin> Controller for DocumentStoreController<A> {
    fn service(&self) -> &ManagedServiceDefinition {
        &self.service
    }

    async fn probe(&self) -> Result<(), ControllerError> {
        Ok(self.admin.ping().await?)
    }

    #[instrument(skip(self), fields(service = %self.service.name))]
    async fn apply_artifacts(&self) -> Result<ApplySummary, ControllerError> {
        let Some(content) = self.artifacts.iter().find_map(ConfigArtifact::as_structured) else {
            warn!("No couchbase config found");
            return Ok(ApplySummary::default());
        };
        let scopes = declared_scopes(content, &self.environment)?;
        if scopes.is_empty() {
            warn!("No scopes declared");
            return Ok(ApplySummary::default());
        }

        let existing: HashMap<String, HashSet<String>> = self
            .admin
            .scopes()
            .await?
            .into_iter()
            .map(|scope| (scope.name, scope.collections.into_iter().collect()))
            .collect();

        let mut summary = ApplySummary::default();
        for scope in &scopes {
            let present = existing.get(&scope.name);
            if present.is_some() {
                debug!(scope = %scope.name, "Scope exists");
                summary.unchanged += 1;
            } else {
                self.admin.create_scope(&scope.name).await?;
                info!(scope = %scope.name, "Created scope");
                summary.applied += 1;
            }

            for collection in &scope.collections {
                if present.is_some_and(|names| names.contains(&collection.name)) {
                    debug!(scope = %scope.name, collection = %collection.name, "Collection exists");
                    summary.unchanged += 1;
                } else {
                    self.admin.create_collection(&scope.name, collection).await?;
                    info!(
                        scope = %scope.name,
                        collection = %collection.name,
                        max_ttl = ?collection.max_ttl,
                        "Created collection"
                    );
                    summary.applied += 1;
                }
                if collection.primary_index {
                    self.admin.create_primary_index(&scope.name, &collection.name).await?;
                    debug!(scope = %scope.name, collection = %collection.name, "Primary index ensured");
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ScopeInfo;
    use crate::document_store::{CollectionSpec, DocumentStoreError};
    use crate::model::BackendKind;
    use crate::settings::Settings;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        CreateScope(String),
        CreateCollection(String, String),
        PrimaryIndex(String, String),
    }

    #[derive(Default)]
    struct FakeBucket {
        scopes: Mutex<Vec<ScopeInfo>>,
        calls: Mutex<Vec<Call>>,
        reject_collections: bool,
    }

    impl FakeBucket {
        fn with_scope(self, name: &str, collections: &[&str]) -> Self {
            self.scopes.lock().unwrap().push(ScopeInfo {
                name: name.to_string(),
                collections: collections.iter().map(|c| c.to_string()).collect(),
            });
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl HealthCheck for FakeBucket {}

    #[async_trait]
    impl BucketAdmin for FakeBucket {
        async fn ping(&self) -> Result<(), DocumentStoreError> {
            Ok(())
        }

        async fn scopes(&self) -> Result<Vec<ScopeInfo>, DocumentStoreError> {
            Ok(self.scopes.lock().unwrap().clone())
        }

        async fn create_scope(&self, scope: &str) -> Result<(), DocumentStoreError> {
            self.calls.lock().unwrap().push(Call::CreateScope(scope.to_string()));
            self.scopes.lock().unwrap().push(ScopeInfo {
                name: scope.to_string(),
                collections: Vec::new(),
            });
            Ok(())
        }

        async fn create_collection(&self, scope: &str, collection: &CollectionSpec) -> Result<(), DocumentStoreError> {
            if self.reject_collections {
                return Err(DocumentStoreError::Rejected {
                    operation: "create collection".to_string(),
                    status: 400,
                    body: "maxTTL out of range".to_string(),
                });
            }
            self.calls
                .lock()
                .unwrap()
                .push(Call::CreateCollection(scope.to_string(), collection.name.clone()));
            let mut scopes = self.scopes.lock().unwrap();
            if let Some(info) = scopes.iter_mut().find(|s| s.name == scope) {
                info.collections.push(collection.name.clone());
            }
            Ok(())
        }

        async fn create_primary_index(&self, scope: &str, collection: &str) -> Result<(), DocumentStoreError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::PrimaryIndex(scope.to_string(), collection.to_string()));
            Ok(())
        }
    }

    const CONFIG: &str = r#"
scopes:
  - name: inventory
    collections:
      - {name: items, primary_index: true}
      - {name: audit}
"#;

    fn controller(bucket: FakeBucket, yaml: Option<&str>) -> DocumentStoreController<FakeBucket> {
        let artifacts = yaml
            .map(|y| vec![ConfigArtifact::StructuredConfig(serde_yaml::from_str::<Settings>(y).unwrap())])
            .unwrap_or_default();
        DocumentStoreController::new(
            ManagedServiceDefinition::new("kv-store", BackendKind::DocumentStore, "kv"),
            bucket,
            artifacts,
            "dev",
        )
    }

    #[tokio::test]
    async fn creates_missing_scope_and_collections() {
        let controller = controller(FakeBucket::default(), Some(CONFIG));

        assert_eq!(controller.apply_artifacts().await.unwrap(), ApplySummary::new(3, 0));
        assert_eq!(
            controller.admin().calls(),
            [
                Call::CreateScope("inventory".into()),
                Call::CreateCollection("inventory".into(), "items".into()),
                Call::PrimaryIndex("inventory".into(), "items".into()),
                Call::CreateCollection("inventory".into(), "audit".into()),
            ]
        );
    }

    #[tokio::test]
    async fn existing_items_are_left_untouched() {
        let bucket = FakeBucket::default().with_scope("inventory", &["items"]);
        let controller = controller(bucket, Some(CONFIG));

        assert_eq!(controller.apply_artifacts().await.unwrap(), ApplySummary::new(1, 2));
        assert_eq!(
            controller.admin().calls(),
            [
                Call::PrimaryIndex("inventory".into(), "items".into()),
                Call::CreateCollection("inventory".into(), "audit".into()),
            ]
        );
    }

    #[tokio::test]
    async fn reapplying_creates_nothing_new() {
        let controller = controller(FakeBucket::default(), Some(CONFIG));
        controller.apply_artifacts().await.unwrap();
        assert_eq!(controller.apply_artifacts().await.unwrap(), ApplySummary::new(0, 3));
    }

    #[tokio::test]
    async fn backend_rejection_becomes_a_failure() {
        let bucket = FakeBucket {
            reject_collections: true,
            ..Default::default()
        };
        let result = controller(bucket, Some(CONFIG)).apply().await;
        assert!(!result.is_success());
        assert!(result.outcome.to_string().contains("maxTTL out of range"));
    }

    #[tokio::test]
    async fn missing_config_is_a_successful_no_op() {
        let controller = controller(FakeBucket::default(), None);
        assert_eq!(controller.apply_artifacts().await.unwrap(), ApplySummary::default());
        assert!(controller.admin().calls().is_empty());
    }
}
