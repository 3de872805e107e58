//! Couchbase over its REST interfaces.
//!
//! Scope and collection management goes through the cluster manager
//! (`/pools/default/buckets/...`); index creation and repository access go
//! through the query service (`/query/service`).

use super::traits::{BucketAdmin, QueryService, ScopeInfo};
use crate::document_store::{CollectionSpec, DocumentStoreError};
use crate::framework::{HealthCheck, HealthStatus};
use crate::model::{ConnectionTarget, TargetField};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

const MANAGEMENT_PORT: u16 = 8091;
const MANAGEMENT_TLS_PORT: u16 = 18091;
const QUERY_PORT: u16 = 8093;
const QUERY_TLS_PORT: u16 = 18093;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Base URLs of the two services the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub management: String,
    pub query: String,
}

impl Endpoints {
    /// Derives the endpoints from the target's host and protocol.
    ///
    /// `couchbase` and `couchbases` use the standard (TLS) ports on the given
    /// host; a port in the host overrides the management port only. `http`
    /// and `https` send both services to the host as given, for deployments
    /// behind a single gateway.
    pub fn resolve(target: &ConnectionTarget) -> Result<Self, DocumentStoreError> {
        let protocol = target.require(TargetField::Protocol)?.trim().to_ascii_lowercase();
        let (scheme, management_port, query_port) = match protocol.as_str() {
            "couchbase" => ("http", MANAGEMENT_PORT, QUERY_PORT),
            "couchbases" => ("https", MANAGEMENT_TLS_PORT, QUERY_TLS_PORT),
            "http" | "https" => {
                let base = format!("{protocol}://{}", target.host.trim_end_matches('/'));
                return Ok(Self {
                    management: base.clone(),
                    query: base,
                });
            }
            other => return Err(DocumentStoreError::UnsupportedProtocol(other.to_string())),
        };
        let (host, port) = target.host_and_port(management_port);
        Ok(Self {
            management: format!("{scheme}://{host}:{port}"),
            query: format!("{scheme}://{host}:{query_port}"),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ScopesResponse {
    #[serde(default)]
    scopes: Vec<ScopeEntry>,
}

#[derive(Debug, Deserialize)]
struct ScopeEntry {
    name: String,
    #[serde(default)]
    collections: Vec<CollectionEntry>,
}

#[derive(Debug, Deserialize)]
struct CollectionEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    errors: Vec<QueryErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct QueryErrorEntry {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
}

/// Client bound to one bucket.
///
/// Building the client performs no I/O; the first request opens the
/// connection pool.
#[derive(Clone)]
pub struct CouchbaseClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    bucket: String,
    username: String,
    password: String,
}

impl std::fmt::Debug for CouchbaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CouchbaseClient")
            .field("endpoints", &self.endpoints)
            .field("bucket", &self.bucket)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl CouchbaseClient {
    pub fn new(target: &ConnectionTarget) -> Result<Self, DocumentStoreError> {
        let endpoints = Endpoints::resolve(target)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| DocumentStoreError::Http {
                url: endpoints.management.clone(),
                source,
            })?;
        Ok(Self {
            http,
            endpoints,
            bucket: target.require(TargetField::Database)?.to_string(),
            username: target.require(TargetField::Principal)?.to_string(),
            password: target.require(TargetField::Secret)?.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn bucket_url(&self, path: &str) -> String {
        format!("{}/pools/default/buckets/{}{path}", self.endpoints.management, self.bucket)
    }

    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, DocumentStoreError> {
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|source| DocumentStoreError::Http {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DocumentStoreError::Rejected {
            operation: operation.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl BucketAdmin for CouchbaseClient {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn ping(&self) -> Result<(), DocumentStoreError> {
        let url = self.bucket_url("");
        self.send("bucket lookup", self.http.get(&url), &url).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn scopes(&self) -> Result<Vec<ScopeInfo>, DocumentStoreError> {
        let url = self.bucket_url("/scopes");
        let response = self.send("list scopes", self.http.get(&url), &url).await?;
        let body: ScopesResponse = response
            .json()
            .await
            .map_err(|e| DocumentStoreError::Decode(e.to_string()))?;
        debug!(count = body.scopes.len(), "Listed scopes");
        Ok(body
            .scopes
            .into_iter()
            .map(|scope| ScopeInfo {
                name: scope.name,
                collections: scope.collections.into_iter().map(|c| c.name).collect(),
            })
            .collect())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn create_scope(&self, scope: &str) -> Result<(), DocumentStoreError> {
        let url = self.bucket_url("/scopes");
        let request = self.http.post(&url).form(&[("name", scope)]);
        self.send("create scope", request, &url).await?;
        Ok(())
    }

    #[instrument(skip(self, collection), fields(bucket = %self.bucket, collection = %collection.name))]
    async fn create_collection(&self, scope: &str, collection: &CollectionSpec) -> Result<(), DocumentStoreError> {
        let url = self.bucket_url(&format!("/scopes/{scope}/collections"));
        let mut form = vec![("name", collection.name.clone())];
        if let Some(ttl) = collection.max_ttl {
            form.push(("maxTTL", ttl.to_string()));
        }
        let request = self.http.post(&url).form(&form);
        self.send("create collection", request, &url).await?;
        Ok(())
    }

    async fn create_primary_index(&self, scope: &str, collection: &str) -> Result<(), DocumentStoreError> {
        let statement = format!(
            "CREATE PRIMARY INDEX IF NOT EXISTS ON `{}`.`{scope}`.`{collection}`",
            self.bucket
        );
        self.query(&statement, Vec::new()).await?;
        Ok(())
    }
}

#[async_trait]
impl QueryService for CouchbaseClient {
    #[instrument(skip(self, args))]
    async fn query(&self, statement: &str, args: Vec<Value>) -> Result<Vec<Value>, DocumentStoreError> {
        let url = format!("{}/query/service", self.endpoints.query);
        let request = self
            .http
            .post(&url)
            .json(&json!({ "statement": statement, "args": args }));
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|source| DocumentStoreError::Http {
                url: url.clone(),
                source,
            })?;
        // Query errors come back with a non-2xx status and a JSON body.
        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| DocumentStoreError::Decode(e.to_string()))?;
        if body.status != "success" || !body.errors.is_empty() {
            let reason = body
                .errors
                .iter()
                .map(|e| format!("[{}] {}", e.code, e.msg))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(DocumentStoreError::Query(if reason.is_empty() {
                format!("status {}", body.status)
            } else {
                reason
            }));
        }
        debug!(rows = body.results.len(), "Query complete");
        Ok(body.results)
    }
}

#[async_trait]
impl HealthCheck for CouchbaseClient {
    async fn health_check(&self) -> Option<HealthStatus> {
        Some(match BucketAdmin::ping(self).await {
            Ok(()) => HealthStatus::ok().with_detail("bucket", self.bucket.clone()),
            Err(e) => HealthStatus::error(e.to_string()).with_detail("bucket", self.bucket.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(host: &str, protocol: &str) -> ConnectionTarget {
        ConnectionTarget {
            host: host.to_string(),
            principal: Some("admin".to_string()),
            secret: Some("secret".to_string()),
            database: Some("main".to_string()),
            protocol: Some(protocol.to_string()),
        }
    }

    #[test]
    fn couchbase_scheme_uses_standard_ports() {
        let endpoints = Endpoints::resolve(&target("cb.local", "couchbase")).unwrap();
        assert_eq!(endpoints.management, "http://cb.local:8091");
        assert_eq!(endpoints.query, "http://cb.local:8093");
    }

    #[test]
    fn tls_scheme_uses_tls_ports_and_honours_an_explicit_port() {
        let endpoints = Endpoints::resolve(&target("cb.local:28091", "COUCHBASES")).unwrap();
        assert_eq!(endpoints.management, "https://cb.local:28091");
        assert_eq!(endpoints.query, "https://cb.local:18093");
    }

    #[test]
    fn http_scheme_uses_the_host_as_given() {
        let endpoints = Endpoints::resolve(&target("gateway:9000/", "http")).unwrap();
        assert_eq!(endpoints.management, "http://gateway:9000");
        assert_eq!(endpoints.query, "http://gateway:9000");
    }

    #[test]
    fn unknown_protocols_are_rejected() {
        let err = Endpoints::resolve(&target("cb.local", "memcached")).unwrap_err();
        assert!(matches!(err, DocumentStoreError::UnsupportedProtocol(p) if p == "memcached"));
    }

    #[test]
    fn client_does_not_leak_the_password() {
        let client = CouchbaseClient::new(&target("cb.local", "couchbase")).unwrap();
        assert_eq!(client.bucket(), "main");
        assert!(!format!("{client:?}").contains("secret"));
    }
}
