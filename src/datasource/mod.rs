//! Data sources feeding the metrics collector
//!
//! The collector only depends on [`MetricSource`]: "run the query, get typed
//! rows, transient failures already retried". [`PgDataSource`] is the
//! production implementation backed by a pooled Postgres connection.

pub mod postgres;

pub use postgres::PgDataSource;

use crate::error::ExporterError;
use crate::rows::{BudgetRow, EntityLimitRow, KeyStatusRow, SpendAggregateRow};
use crate::window::TimeWindow;
use async_trait::async_trait;

#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Spend aggregated over the trailing `window`
    async fn spend_aggregates(
        &self,
        window: &TimeWindow,
    ) -> Result<Vec<SpendAggregateRow>, ExporterError>;

    async fn rate_limits(&self) -> Result<Vec<EntityLimitRow>, ExporterError>;

    async fn budgets(&self) -> Result<Vec<BudgetRow>, ExporterError>;

    async fn key_statuses(&self) -> Result<Vec<KeyStatusRow>, ExporterError>;
}
