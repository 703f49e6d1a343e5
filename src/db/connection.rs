//! Database connection management using sqlx

use super::{QueryExecutor, Record};
use crate::config::DatabaseConfig;
use crate::error::{ChatSqlError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use std::time::Duration;
use tracing::{debug, info};

/// PostgreSQL handle with an explicit connect/disconnect lifecycle
///
/// Every operation fails with [`ChatSqlError::NotConnected`] before [`connect`] or after
/// [`disconnect`]. The pool defaults to a single connection, so concurrent use of one
/// handle is serialized by the driver.
///
/// [`connect`]: PostgresDatabase::connect
/// [`disconnect`]: PostgresDatabase::disconnect
pub struct PostgresDatabase {
    config: DatabaseConfig,
    pool: Option<PgPool>,
}

impl PostgresDatabase {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config, pool: None }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.pool.is_some()
    }

    fn connect_options(&self) -> Result<PgConnectOptions> {
        match &self.config.url {
            Some(url) => Ok(url.parse::<PgConnectOptions>()?),
            None => Ok(PgConnectOptions::new()
                .host(&self.config.host)
                .port(self.config.port)
                .database(&self.config.database)
                .username(&self.config.user)
                .password(&self.config.password)),
        }
    }

    /// Open the connection pool and check it with a trivial query
    pub async fn connect(&mut self) -> Result<()> {
        if self.pool.is_some() {
            debug!("Already connected, keeping the existing pool");
            return Ok(());
        }

        let options = self.connect_options()?;
        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        info!(
            "Connected to PostgreSQL database {} on {}:{}",
            self.config.database, self.config.host, self.config.port
        );
        self.pool = Some(pool);
        Ok(())
    }

    /// Close the pool; fails if it was never opened or is already closed
    pub async fn disconnect(&mut self) -> Result<()> {
        let pool = self.pool.take().ok_or(ChatSqlError::NotConnected)?;
        pool.close().await;
        info!("Disconnected from PostgreSQL");
        Ok(())
    }

    pub(crate) fn pool(&self) -> Result<&PgPool> {
        self.pool.as_ref().ok_or(ChatSqlError::NotConnected)
    }

    /// Run a statement and return the number of affected rows
    ///
    /// Without parameters the text goes through the simple query protocol, so it may hold
    /// several statements.
    pub async fn execute(&self, query: &str, params: &[&str]) -> Result<u64> {
        let pool = self.pool()?;
        debug!("Executing: {}", query);

        let result = if params.is_empty() {
            sqlx::raw_sql(query).execute(pool).await?
        } else {
            let mut statement = sqlx::query(query);
            for param in params {
                statement = statement.bind(param.to_string());
            }
            statement.execute(pool).await?
        };

        Ok(result.rows_affected())
    }

    /// Run a query with text parameters bound to `$1..$n`
    pub async fn fetch(&self, query: &str, params: &[&str]) -> Result<Vec<PgRow>> {
        let pool = self.pool()?;
        debug!("Fetching: {}", query);

        let mut statement = sqlx::query(query);
        for param in params {
            statement = statement.bind(param.to_string());
        }
        Ok(statement.fetch_all(pool).await?)
    }

    /// Run a query and decode every row into a JSON object, whatever its column types
    pub async fn fetch_records(&self, query: &str) -> Result<Vec<Record>> {
        let pool = self.pool()?;
        let wrapped = wrap_as_json(query);
        debug!("Fetching records: {}", wrapped);

        let rows: Vec<(String,)> = sqlx::query_as(&wrapped).fetch_all(pool).await?;
        let records = rows
            .into_iter()
            .map(|(text,)| parse_record(&text))
            .collect::<Result<Vec<_>>>()?;

        info!("Query returned {} rows", records.len());
        Ok(records)
    }
}

#[async_trait]
impl QueryExecutor for PostgresDatabase {
    async fn fetch_records(&self, query: &str) -> Result<Vec<Record>> {
        PostgresDatabase::fetch_records(self, query).await
    }
}

/// Wrap a single SELECT so each row comes back as JSON text in column order
fn wrap_as_json(query: &str) -> String {
    let body = query.trim().trim_end_matches(';').trim_end();
    format!("SELECT row_to_json(t)::text FROM ({}) AS t", body)
}

/// Decode one `row_to_json` row; numbers keep their exact digits
fn parse_record(text: &str) -> Result<Record> {
    Ok(serde_json::from_str::<Record>(text)?)
}
