//! PostgreSQL statement executor.

use super::traits::SqlExecutor;
use crate::framework::{HealthCheck, HealthStatus};
use crate::model::{ConnectionTarget, TargetField};
use crate::relational::RelationalError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_postgres::{Client, Config, NoTls};
use tracing::{debug, info, instrument, warn};

const DEFAULT_PORT: u16 = 5432;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Auto-commit executor for one database.
///
/// Every statement is sent as its own simple query outside any explicit
/// transaction, so each one commits independently. The connection is opened
/// on first use and reused until the server closes it; the next call after
/// that opens a new one.
pub struct PostgresClient {
    config: Config,
    database: String,
    client: Mutex<Option<Arc<Client>>>,
}

impl std::fmt::Debug for PostgresClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresClient")
            .field("hosts", &self.config.get_hosts())
            .field("database", &self.database)
            .finish()
    }
}

impl PostgresClient {
    pub fn new(target: &ConnectionTarget) -> Result<Self, RelationalError> {
        let (host, port) = target.host_and_port(DEFAULT_PORT);
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let database = target.require(TargetField::Database)?.to_string();

        let mut config = Config::new();
        config
            .host(host)
            .port(port)
            .dbname(&database)
            .user(target.require(TargetField::Principal)?)
            .password(target.require(TargetField::Secret)?)
            .application_name("service-config-manager")
            .connect_timeout(CONNECT_TIMEOUT);

        Ok(Self {
            config,
            database,
            client: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<Arc<Client>, RelationalError> {
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref() {
            if !client.is_closed() {
                return Ok(client.clone());
            }
            info!(database = %self.database, "Postgres connection lost, reconnecting");
            *slot = None;
        }

        let (client, connection) = self.config.connect(NoTls).await.map_err(RelationalError::Connect)?;
        let database = self.database.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(database = %database, error = %e, "Postgres connection closed");
            }
        });
        info!(database = %self.database, "Connected to Postgres");
        let client = Arc::new(client);
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Drops the cached connection when `result` shows it is gone.
    async fn checked<T>(
        &self,
        client: &Arc<Client>,
        result: Result<T, tokio_postgres::Error>,
    ) -> Result<T, RelationalError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_closed() || client.is_closed() {
                    let mut slot = self.client.lock().await;
                    if slot.as_ref().is_some_and(|cached| Arc::ptr_eq(cached, client)) {
                        *slot = None;
                    }
                }
                Err(RelationalError::from_driver(e))
            }
        }
    }
}

#[async_trait]
impl SqlExecutor for PostgresClient {
    #[instrument(skip(self), fields(database = %self.database))]
    async fn ping(&self) -> Result<(), RelationalError> {
        let client = self.connection().await?;
        let result = client.simple_query("SELECT 1").await;
        self.checked(&client, result).await?;
        Ok(())
    }

    async fn execute(&self, statement: &str) -> Result<(), RelationalError> {
        let client = self.connection().await?;
        debug!(database = %self.database, bytes = statement.len(), "Executing statement");
        let result = client.batch_execute(statement).await;
        self.checked(&client, result).await
    }
}

#[async_trait]
impl HealthCheck for PostgresClient {
    async fn health_check(&self) -> Option<HealthStatus> {
        Some(match self.ping().await {
            Ok(()) => HealthStatus::ok().with_detail("database", self.database.clone()),
            Err(e) => HealthStatus::error(e.to_string()).with_detail("database", self.database.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_postgres::config::Host;

    fn target(host: &str) -> ConnectionTarget {
        ConnectionTarget {
            host: host.to_string(),
            principal: Some("app".to_string()),
            secret: Some("secret".to_string()),
            database: Some("orders".to_string()),
            protocol: None,
        }
    }

    #[test]
    fn port_defaults_to_5432() {
        let client = PostgresClient::new(&target("db.local")).unwrap();
        assert_eq!(client.config.get_ports(), [5432]);
        assert_eq!(client.config.get_hosts(), [Host::Tcp("db.local".to_string())]);
        assert_eq!(client.config.get_dbname(), Some("orders"));
    }

    #[test]
    fn explicit_port_and_ipv6_host() {
        let client = PostgresClient::new(&target("[::1]:6543")).unwrap();
        assert_eq!(client.config.get_ports(), [6543]);
        assert_eq!(client.config.get_hosts(), [Host::Tcp("::1".to_string())]);
    }

    #[test]
    fn construction_does_not_connect() {
        let client = PostgresClient::new(&target("unreachable.invalid")).unwrap();
        assert!(client.client.try_lock().unwrap().is_none());
        assert!(!format!("{client:?}").contains("secret"));
    }

    const SSL_REQUEST: i32 = 80877103;

    async fn read_frame(socket: &mut TcpStream, len: i32) -> std::io::Result<Vec<u8>> {
        let mut body = vec![0; len as usize - 4];
        socket.read_exact(&mut body).await?;
        Ok(body)
    }

    /// Minimal server side of the wire protocol: trusts every login and
    /// answers each query with an empty result. With `hang_up` set it closes
    /// the session on the first query instead.
    async fn serve(mut socket: TcpStream, hang_up: bool) -> std::io::Result<()> {
        loop {
            let len = socket.read_i32().await?;
            let body = read_frame(&mut socket, len).await?;
            if body[..4] == SSL_REQUEST.to_be_bytes() {
                socket.write_all(b"N").await?;
                continue;
            }
            break;
        }
        socket.write_all(&[b'R', 0, 0, 0, 8, 0, 0, 0, 0]).await?;
        socket.write_all(&[b'Z', 0, 0, 0, 5, b'I']).await?;

        loop {
            let tag = socket.read_u8().await?;
            let len = socket.read_i32().await?;
            read_frame(&mut socket, len).await?;
            if tag == b'X' || hang_up {
                return Ok(());
            }
            let command = b"SELECT 0\0";
            let mut reply = vec![b'C'];
            reply.extend_from_slice(&(4 + command.len() as i32).to_be_bytes());
            reply.extend_from_slice(command);
            reply.extend_from_slice(&[b'Z', 0, 0, 0, 5, b'I']);
            socket.write_all(&reply).await?;
        }
    }

    #[tokio::test]
    async fn reconnects_after_the_server_drops_the_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let first = counter.fetch_add(1, Ordering::SeqCst) == 0;
                tokio::spawn(serve(socket, first));
            }
        });

        let client = PostgresClient::new(&target(&addr.to_string())).unwrap();
        assert!(client.ping().await.is_err());
        client.ping().await.unwrap();
        client.execute("CREATE TABLE t (id int)").await.unwrap();
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }
}
