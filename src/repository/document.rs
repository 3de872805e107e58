//! Repository over the document store's query service.
//!
//! Records are stored as JSON documents keyed by id. Every statement is
//! parameterised; only the keyspace is spliced into the text, and its parts
//! are validated and quoted.

use super::{Record, Repository, RepositoryError, Stored};
use crate::clients::QueryService;
use crate::document_store::DocumentStoreError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Fully qualified collection: `bucket.scope.collection`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Keyspace {
    pub bucket: String,
    pub scope: String,
    pub collection: String,
}

impl Keyspace {
    pub fn new(
        bucket: impl Into<String>,
        scope: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self, RepositoryError> {
        let keyspace = Self {
            bucket: bucket.into(),
            scope: scope.into(),
            collection: collection.into(),
        };
        for part in [&keyspace.bucket, &keyspace.scope, &keyspace.collection] {
            if part.is_empty() || part.contains('`') || part.contains('.') {
                return Err(RepositoryError::InvalidKeyspace(keyspace.to_string()));
            }
        }
        Ok(keyspace)
    }

    /// The keyspace as it appears in a statement.
    pub fn quoted(&self) -> String {
        format!("`{}`.`{}`.`{}`", self.bucket, self.scope, self.collection)
    }
}

impl FromStr for Keyspace {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split('.').collect::<Vec<_>>()[..] {
            [bucket, scope, collection] => Keyspace::new(bucket, scope, collection),
            _ => Err(RepositoryError::InvalidKeyspace(s.to_string())),
        }
    }
}

impl fmt::Display for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.bucket, self.scope, self.collection)
    }
}

#[derive(Deserialize)]
struct Row {
    id: String,
    data: Value,
}

/// Stores records of type `T` in one keyspace.
pub struct DocumentRepository<T, Q: ?Sized = dyn QueryService> {
    keyspace: Keyspace,
    client: Arc<Q>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record, Q: QueryService + ?Sized> DocumentRepository<T, Q> {
    pub fn new(keyspace: Keyspace, client: Arc<Q>) -> Self {
        Self {
            keyspace,
            client,
            _record: PhantomData,
        }
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    fn select(&self) -> String {
        format!("SELECT META(d).id AS id, d AS data FROM {} AS d", self.keyspace.quoted())
    }

    async fn fetch(&self, statement: &str, args: Vec<Value>) -> Result<Vec<Stored<T>>, RepositoryError> {
        self.client
            .query(statement, args)
            .await?
            .into_iter()
            .map(|row| -> Result<Stored<T>, RepositoryError> {
                let row: Row = serde_json::from_value(row)?;
                Ok(Stored {
                    id: row.id,
                    data: serde_json::from_value(row.data)?,
                })
            })
            .collect()
    }
}

fn is_duplicate_key(err: &DocumentStoreError) -> bool {
    matches!(err, DocumentStoreError::Query(reason) if reason.contains("12009") || reason.contains("Duplicate Key"))
}

#[async_trait]
impl<T: Record, Q: QueryService + ?Sized> Repository<T> for DocumentRepository<T, Q> {
    #[instrument(skip(self), fields(keyspace = %self.keyspace))]
    async fn get(&self, id: &str) -> Result<Option<Stored<T>>, RepositoryError> {
        let statement = format!("{} USE KEYS $1", self.select());
        Ok(self.fetch(&statement, vec![json!(id)]).await?.into_iter().next())
    }

    #[instrument(skip(self, data), fields(keyspace = %self.keyspace))]
    async fn insert(&self, id: String, data: T) -> Result<Stored<T>, RepositoryError> {
        let statement = format!("INSERT INTO {} (KEY, VALUE) VALUES ($1, $2)", self.keyspace.quoted());
        let document = serde_json::to_value(&data)?;
        match self.client.query(&statement, vec![json!(id), document]).await {
            Ok(_) => {
                debug!(%id, "Inserted");
                Ok(Stored { id, data })
            }
            Err(e) if is_duplicate_key(&e) => Err(RepositoryError::AlreadyExists(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// The existence check and the write are separate statements, so a
    /// concurrent delete in between results in the record being recreated.
    #[instrument(skip(self, item), fields(keyspace = %self.keyspace, id = %item.id))]
    async fn update(&self, item: Stored<T>) -> Result<Stored<T>, RepositoryError> {
        let exists = format!("SELECT RAW META(d).id FROM {} AS d USE KEYS $1", self.keyspace.quoted());
        if self.client.query(&exists, vec![json!(item.id)]).await?.is_empty() {
            return Err(RepositoryError::NotFound(item.id));
        }
        let statement = format!("UPSERT INTO {} (KEY, VALUE) VALUES ($1, $2)", self.keyspace.quoted());
        let document = serde_json::to_value(&item.data)?;
        self.client.query(&statement, vec![json!(item.id), document]).await?;
        Ok(item)
    }

    #[instrument(skip(self), fields(keyspace = %self.keyspace))]
    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let statement = format!(
            "DELETE FROM {} AS d USE KEYS $1 RETURNING META(d).id",
            self.keyspace.quoted()
        );
        Ok(!self.client.query(&statement, vec![json!(id)]).await?.is_empty())
    }

    /// Needs a primary index on the collection.
    #[instrument(skip(self), fields(keyspace = %self.keyspace))]
    async fn list(&self, limit: Option<usize>) -> Result<Vec<Stored<T>>, RepositoryError> {
        let mut statement = format!("{} ORDER BY META(d).id", self.select());
        let mut args = Vec::new();
        if let Some(limit) = limit {
            statement.push_str(" LIMIT $1");
            args.push(json!(limit));
        }
        self.fetch(&statement, args).await
    }

    /// One round trip for all keys.
    #[instrument(skip(self), fields(keyspace = %self.keyspace))]
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Stored<T>>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let statement = format!("{} USE KEYS $1", self.select());
        self.fetch(&statement, vec![json!(ids)]).await
    }
}
