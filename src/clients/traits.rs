//! Backend driver seams.
//!
//! Controllers are generic over these traits so they can run against the
//! real clients in this module or against in-memory fakes in tests. Each
//! driver is also a [`HealthCheck`] handle.

use crate::document_store::{CollectionSpec, DocumentStoreError};
use crate::event_broker::{EventBrokerError, TopicSpec};
use crate::framework::HealthCheck;
use crate::relational::RelationalError;
use async_trait::async_trait;
use serde_json::Value;

/// A scope and the names of its collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeInfo {
    pub name: String,
    pub collections: Vec<String>,
}

/// Scope and collection management for one bucket.
#[async_trait]
pub trait BucketAdmin: HealthCheck {
    async fn ping(&self) -> Result<(), DocumentStoreError>;

    async fn scopes(&self) -> Result<Vec<ScopeInfo>, DocumentStoreError>;

    async fn create_scope(&self, scope: &str) -> Result<(), DocumentStoreError>;

    async fn create_collection(&self, scope: &str, collection: &CollectionSpec) -> Result<(), DocumentStoreError>;

    /// Must be a no-op when the index already exists.
    async fn create_primary_index(&self, scope: &str, collection: &str) -> Result<(), DocumentStoreError>;
}

/// Parameterised statements against the document store's query service.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn query(&self, statement: &str, args: Vec<Value>) -> Result<Vec<Value>, DocumentStoreError>;
}

/// Topic management on a Kafka-protocol broker.
#[async_trait]
pub trait TopicAdmin: HealthCheck {
    async fn ping(&self) -> Result<(), EventBrokerError> {
        self.topics().await.map(|_| ())
    }

    async fn topics(&self) -> Result<Vec<String>, EventBrokerError>;

    async fn create_topic(&self, topic: &TopicSpec) -> Result<(), EventBrokerError>;
}

/// Statement execution in auto-commit mode: every successful call is
/// committed on its own.
#[async_trait]
pub trait SqlExecutor: HealthCheck {
    async fn ping(&self) -> Result<(), RelationalError>;

    async fn execute(&self, statement: &str) -> Result<(), RelationalError>;
}
