//! Test fixtures for integration tests
//!
//! Provides a PostgreSQL container with the shelf monitoring tables.

use anyhow::Result;
use shelfwatch_rdbc::prelude::*;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// PostgreSQL container wrapper
pub struct TestPostgres {
    pub container: testcontainers::ContainerAsync<testcontainers_modules::postgres::Postgres>,
    pub connection_string: String,
    pub host: String,
    pub port: u16,
}

impl TestPostgres {
    /// Start a PostgreSQL container and create the shelf tables
    pub async fn start() -> Result<Self> {
        use testcontainers::{runners::AsyncRunner, ImageExt};
        use testcontainers_modules::postgres::Postgres;

        let container = Postgres::default()
            .with_env_var("POSTGRES_DB", "testdb")
            .with_env_var("POSTGRES_USER", "testuser")
            .with_env_var("POSTGRES_PASSWORD", "testpass")
            .start()
            .await?;

        // Retry port retrieval to handle testcontainers race condition
        let host = container.get_host().await?.to_string();
        let mut port = None;
        for i in 0..10 {
            match container.get_host_port_ipv4(5432).await {
                Ok(p) => {
                    port = Some(p);
                    break;
                }
                Err(e) => {
                    tracing::debug!(
                        "Waiting for PostgreSQL port exposure (attempt {}): {}",
                        i + 1,
                        e
                    );
                    sleep(Duration::from_millis(100 * (i + 1) as u64)).await;
                }
            }
        }
        let port =
            port.ok_or_else(|| anyhow::anyhow!("PostgreSQL port not exposed after retries"))?;

        let connection_string = format!(
            "host={} port={} user=testuser password=testpass dbname=testdb",
            host, port
        );

        let pg = Self {
            container,
            connection_string,
            host,
            port,
        };
        pg.wait_until_ready().await?;
        pg.setup_schema().await?;
        Ok(pg)
    }

    async fn wait_until_ready(&self) -> Result<()> {
        for i in 0..30 {
            match self.connect().await {
                Ok(client) => {
                    if client.simple_query("SELECT 1").await.is_ok() {
                        info!("PostgreSQL ready after {} attempts", i + 1);
                        return Ok(());
                    }
                }
                Err(e) => {
                    tracing::debug!("Waiting for PostgreSQL (attempt {}): {}", i + 1, e);
                }
            }
            sleep(Duration::from_millis(500)).await;
        }

        anyhow::bail!("PostgreSQL did not become ready in time")
    }

    /// Get a raw tokio-postgres client for assertions
    pub async fn connect(&self) -> Result<tokio_postgres::Client> {
        let (client, connection) =
            tokio_postgres::connect(&self.connection_string, tokio_postgres::NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(client)
    }

    /// Connection settings for the container
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(&self.host, "testuser")
            .with_port(self.port)
            .with_password("testpass")
            .with_database("testdb")
            .with_application_name("shelfwatch-integration-tests")
    }

    /// A store over the container with a short retry interval
    pub fn store(&self) -> Result<AnalyticsStore> {
        let config = StoreConfig::new(self.connection_config())
            .with_pool(
                PoolConfig::new(self.connection_config())
                    .with_max_size(4)
                    .with_max_overflow(2),
            )
            .with_retry(RetryPolicy::bounded(5, Duration::from_millis(200)));
        Ok(AnalyticsStore::connect_postgres(config)?)
    }

    async fn setup_schema(&self) -> Result<()> {
        let client = self.connect().await?;

        client
            .batch_execute(
                r#"
                CREATE TABLE IF NOT EXISTS shelf_fill_events (
                    store_id BIGINT NOT NULL,
                    ts TIMESTAMP NOT NULL,
                    fill_pct DOUBLE PRECISION,
                    image_url TEXT,
                    PRIMARY KEY (store_id, ts)
                );

                CREATE TABLE IF NOT EXISTS store_entrances (
                    id BIGSERIAL PRIMARY KEY,
                    id_store BIGINT NOT NULL,
                    void INTEGER NOT NULL,
                    url TEXT,
                    create_at TIMESTAMP
                );
                "#,
            )
            .await?;

        Ok(())
    }

    /// Remove every row written by a previous test
    pub async fn truncate(&self) -> Result<()> {
        let client = self.connect().await?;
        client
            .batch_execute("TRUNCATE shelf_fill_events, store_entrances")
            .await?;
        Ok(())
    }
}
