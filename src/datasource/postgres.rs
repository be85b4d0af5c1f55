//! Postgres data source
//!
//! Provides:
//! - Connection pooling with configurable min/max size
//! - Bound (never interpolated) query parameters
//! - Exponential-backoff retry around every query

use super::MetricSource;
use crate::config::DatabaseConfig;
use crate::error::{is_decode_error, ExporterError};
use crate::queries::{MetricQuery, MetricQuerySet};
use crate::retry::{RetryError, RetryPolicy};
use crate::rows::{BudgetRow, EntityLimitRow, KeyStatusRow, SpendAggregateRow};
use crate::window::TimeWindow;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::FromRow;
use std::time::Duration;

/// Pooled Postgres handle for the LiteLLM database
pub struct PgDataSource {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PgDataSource {
    /// Create the connection pool
    ///
    /// Connections are opened lazily, so an unreachable database does not
    /// prevent startup; queries retry until the database comes back.
    pub fn connect(config: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password)
            .application_name("litellm-exporter");

        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect_lazy_with(options);

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            min_connections = config.min_connections,
            max_connections = config.max_connections,
            "Database connection pool created"
        );

        Self::from_pool(pool, RetryPolicy::default().with_max_attempts(config.retry_attempts))
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check that the database answers a trivial query
    pub async fn ping(&self) -> Result<(), ExporterError> {
        let pool = &self.pool;
        self.retry
            .run("ping", |e: &sqlx::Error| !is_decode_error(e), move || async move {
                sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
            })
            .await
            .map_err(|RetryError { error, attempts }| ExporterError::DataSourceUnavailable {
                attempts,
                source: error,
            })
    }

    /// Run a metric query and decode its rows
    ///
    /// The connection is held by a pool guard for the duration of one
    /// attempt and goes back to the pool when the guard drops, whether the
    /// attempt succeeded or failed.
    async fn fetch<T>(&self, query: MetricQuery) -> Result<Vec<T>, ExporterError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let pool = &self.pool;
        let sql = query.sql;
        let params = &query.params;

        let result = self
            .retry
            .run(query.name, |e: &sqlx::Error| !is_decode_error(e), move || async move {
                let mut conn = pool.acquire().await?;
                let mut statement = sqlx::query_as::<_, T>(sql);
                for param in params {
                    statement = statement.bind(param.as_str());
                }
                statement.fetch_all(&mut *conn).await
            })
            .await;

        match result {
            Ok(rows) => {
                tracing::debug!(query = query.name, rows = rows.len(), "Query completed");
                Ok(rows)
            }
            Err(RetryError { error, .. }) if is_decode_error(&error) => Err(ExporterError::Decode {
                query: query.name,
                source: error,
            }),
            Err(RetryError { error, attempts }) => Err(ExporterError::DataSourceUnavailable {
                attempts,
                source: error,
            }),
        }
    }
}

#[async_trait]
impl MetricSource for PgDataSource {
    async fn spend_aggregates(
        &self,
        window: &TimeWindow,
    ) -> Result<Vec<SpendAggregateRow>, ExporterError> {
        self.fetch(MetricQuerySet::spend_aggregate(window)).await
    }

    async fn rate_limits(&self) -> Result<Vec<EntityLimitRow>, ExporterError> {
        self.fetch(MetricQuerySet::rate_limits()).await
    }

    async fn budgets(&self) -> Result<Vec<BudgetRow>, ExporterError> {
        self.fetch(MetricQuerySet::budgets()).await
    }

    async fn key_statuses(&self) -> Result<Vec<KeyStatusRow>, ExporterError> {
        self.fetch(MetricQuerySet::key_status()).await
    }
}
