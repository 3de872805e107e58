//! Kafka-protocol admin client for Redpanda.

use super::traits::TopicAdmin;
use crate::event_broker::{EventBrokerError, TopicSpec};
use crate::framework::{HealthCheck, HealthStatus};
use crate::model::ConnectionTarget;
use async_trait::async_trait;
use rskafka::client::{Client, ClientBuilder, SaslConfig};
use std::future::Future;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

const DEFAULT_PORT: u16 = 9092;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CREATE_TOPIC_TIMEOUT_MS: i32 = 5_000;

/// Security protocols the client can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Security {
    Plaintext,
    SaslPlaintext,
}

/// Admin client for one broker cluster.
///
/// The connection is opened on first use and reused afterwards; a failed
/// attempt is retried on the next call.
pub struct RedpandaClient {
    bootstrap: Vec<String>,
    credentials: Option<(String, String)>,
    client: OnceCell<Client>,
}

impl std::fmt::Debug for RedpandaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedpandaClient")
            .field("bootstrap", &self.bootstrap)
            .field("sasl", &self.credentials.as_ref().map(|(user, _)| user))
            .field("connected", &self.client.initialized())
            .finish()
    }
}

impl RedpandaClient {
    pub fn new(target: &ConnectionTarget) -> Result<Self, EventBrokerError> {
        let security = match target.protocol.as_deref().map(|p| p.trim().to_ascii_uppercase()) {
            None => None,
            Some(p) if p == "PLAINTEXT" => Some(Security::Plaintext),
            Some(p) if p == "SASL_PLAINTEXT" => Some(Security::SaslPlaintext),
            Some(other) => return Err(EventBrokerError::UnsupportedProtocol(other)),
        };

        let credentials = match (&target.principal, &target.secret) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        };
        let credentials = match (security, credentials) {
            (Some(Security::Plaintext), _) => None,
            (Some(Security::SaslPlaintext), None) => {
                return Err(EventBrokerError::InvalidConfig(
                    "SASL_PLAINTEXT requires a user and a password".to_string(),
                ))
            }
            (_, credentials) => credentials,
        };

        Ok(Self {
            bootstrap: bootstrap_servers(&target.host),
            credentials,
            client: OnceCell::new(),
        })
    }

    pub fn bootstrap(&self) -> &[String] {
        &self.bootstrap
    }

    fn sasl_config(&self) -> Option<SaslConfig> {
        self.credentials.as_ref().map(|(username, password)| SaslConfig::Plain {
            username: username.clone(),
            password: password.clone(),
        })
    }

    fn builder(&self) -> ClientBuilder {
        let builder = ClientBuilder::new(self.bootstrap.clone());
        match self.sasl_config() {
            Some(sasl) => builder.sasl_config(sasl),
            None => builder,
        }
    }

    async fn connection(&self) -> Result<&Client, EventBrokerError> {
        self.client
            .get_or_try_init(|| async {
                let client = with_timeout(CONNECT_TIMEOUT, self.builder().build()).await?;
                info!(bootstrap = ?self.bootstrap, "Connected to broker");
                Ok::<_, EventBrokerError>(client)
            })
            .await
    }
}

/// Splits a comma-separated host list, adding the default port where missing.
fn bootstrap_servers(hosts: &str) -> Vec<String> {
    hosts
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(|host| {
            let has_port = host
                .rsplit_once(':')
                .is_some_and(|(h, port)| (!h.contains(':') || h.starts_with('[')) && port.parse::<u16>().is_ok());
            if has_port {
                host.to_string()
            } else {
                format!("{host}:{DEFAULT_PORT}")
            }
        })
        .collect()
}

async fn with_timeout<T, F>(limit: Duration, future: F) -> Result<T, EventBrokerError>
where
    F: Future<Output = Result<T, rskafka::client::error::Error>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result.map_err(EventBrokerError::from),
        Err(_) => Err(EventBrokerError::Timeout(limit)),
    }
}

#[async_trait]
impl TopicAdmin for RedpandaClient {
    #[instrument(skip(self))]
    async fn topics(&self) -> Result<Vec<String>, EventBrokerError> {
        let client = self.connection().await?;
        let topics = with_timeout(REQUEST_TIMEOUT, client.list_topics()).await?;
        debug!(count = topics.len(), "Listed topics");
        Ok(topics.into_iter().map(|topic| topic.name).collect())
    }

    #[instrument(skip(self, topic), fields(topic = %topic.name))]
    async fn create_topic(&self, topic: &TopicSpec) -> Result<(), EventBrokerError> {
        let controller = self.connection().await?.controller_client()?;
        with_timeout(
            REQUEST_TIMEOUT,
            controller.create_topic(
                topic.name.clone(),
                topic.partitions,
                topic.replication_factor,
                CREATE_TOPIC_TIMEOUT_MS,
            ),
        )
        .await
    }
}

#[async_trait]
impl HealthCheck for RedpandaClient {
    async fn health_check(&self) -> Option<HealthStatus> {
        Some(match self.topics().await {
            Ok(topics) => HealthStatus::ok().with_detail("topics", topics.len()),
            Err(e) => HealthStatus::error(e.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(host: &str, protocol: Option<&str>, user: Option<&str>) -> ConnectionTarget {
        ConnectionTarget {
            host: host.to_string(),
            principal: user.map(str::to_string),
            secret: user.map(|_| "secret".to_string()),
            database: None,
            protocol: protocol.map(str::to_string),
        }
    }

    #[test]
    fn bootstrap_list_gets_default_ports() {
        assert_eq!(
            bootstrap_servers("a, b:19092 ,,[::1]"),
            ["a:9092", "b:19092", "[::1]:9092"]
        );
    }

    #[test]
    fn credentials_enable_sasl_unless_plaintext_is_forced() {
        let sasl = RedpandaClient::new(&target("bus", None, Some("svc"))).unwrap();
        assert!(sasl.credentials.is_some());

        let plain = RedpandaClient::new(&target("bus", Some("plaintext"), Some("svc"))).unwrap();
        assert!(plain.credentials.is_none());
    }

    #[test]
    fn sasl_plain_carries_the_credentials() {
        let client = RedpandaClient::new(&target("bus", Some("SASL_PLAINTEXT"), Some("svc"))).unwrap();
        assert!(matches!(
            client.sasl_config(),
            Some(SaslConfig::Plain { username, password }) if username == "svc" && password == "secret"
        ));
        let _builder = client.builder();

        let plain = RedpandaClient::new(&target("bus", None, None)).unwrap();
        assert!(plain.sasl_config().is_none());
        let _builder = plain.builder();
    }

    #[test]
    fn sasl_without_credentials_is_rejected() {
        let err = RedpandaClient::new(&target("bus", Some("SASL_PLAINTEXT"), None)).unwrap_err();
        assert!(matches!(err, EventBrokerError::InvalidConfig(_)));
    }

    #[test]
    fn tls_protocols_are_rejected() {
        let err = RedpandaClient::new(&target("bus", Some("sasl_ssl"), Some("svc"))).unwrap_err();
        assert!(matches!(err, EventBrokerError::UnsupportedProtocol(p) if p == "SASL_SSL"));
    }

    #[test]
    fn construction_does_not_connect() {
        let client = RedpandaClient::new(&target("unreachable.invalid", None, None)).unwrap();
        assert!(!client.client.initialized());
        assert!(!format!("{client:?}").contains("secret"));
    }
}
