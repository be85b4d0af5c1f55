//! Typed records for the four metric queries
//!
//! Each query result is decoded into its record at the query boundary. A
//! missing column or a column of the wrong type is a decode error; nullable
//! columns are `Option`s and are interpreted by the collector.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use std::fmt;

/// Holder kind for spend, limits and budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    User,
    Team,
    Organization,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Team => "team",
            Self::Organization => "organization",
        }
    }

    fn decode(row: &PgRow, column: &str) -> Result<Self, sqlx::Error> {
        let raw: String = row.try_get(column)?;
        match raw.as_str() {
            "user" => Ok(Self::User),
            "team" => Ok(Self::Team),
            "organization" => Ok(Self::Organization),
            other => Err(sqlx::Error::ColumnDecode {
                index: column.to_string(),
                source: format!("unknown entity type '{}'", other).into(),
            }),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spend and usage aggregated per model x user x team x organization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpendAggregateRow {
    pub model: Option<String>,
    pub total_spend: Option<f64>,
    pub total_tokens: Option<f64>,
    pub prompt_tokens: Option<f64>,
    pub completion_tokens: Option<f64>,
    /// Always produced by the query; a missing value is a decode error
    pub request_count: i64,
    pub cache_hits: Option<i64>,
    pub cache_misses: Option<i64>,
    pub user_id: Option<String>,
    pub user_alias: Option<String>,
    pub team_id: Option<String>,
    pub team_alias: Option<String>,
    pub organization_id: Option<String>,
    pub organization_alias: Option<String>,
}

impl FromRow<'_, PgRow> for SpendAggregateRow {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            model: row.try_get("model")?,
            total_spend: row.try_get("total_spend")?,
            total_tokens: row.try_get("total_tokens")?,
            prompt_tokens: row.try_get("prompt_tokens")?,
            completion_tokens: row.try_get("completion_tokens")?,
            request_count: row.try_get("request_count")?,
            cache_hits: row.try_get("cache_hits")?,
            cache_misses: row.try_get("cache_misses")?,
            user_id: row.try_get("user_id")?,
            user_alias: row.try_get("user_alias")?,
            team_id: row.try_get("team_id")?,
            team_alias: row.try_get("team_alias")?,
            organization_id: row.try_get("organization_id")?,
            organization_alias: row.try_get("organization_alias")?,
        })
    }
}

/// Rate limits and blocked flag of a user or team
#[derive(Debug, Clone, PartialEq)]
pub struct EntityLimitRow {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub entity_alias: Option<String>,
    pub tpm_limit: Option<i64>,
    pub rpm_limit: Option<i64>,
    pub max_parallel_requests: Option<i64>,
    pub is_blocked: bool,
}

impl EntityLimitRow {
    pub fn new(entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            entity_alias: None,
            tpm_limit: None,
            rpm_limit: None,
            max_parallel_requests: None,
            is_blocked: false,
        }
    }
}

impl FromRow<'_, PgRow> for EntityLimitRow {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            entity_type: EntityType::decode(row, "entity_type")?,
            entity_id: row.try_get("entity_id")?,
            entity_alias: row.try_get("entity_alias")?,
            tpm_limit: row.try_get("tpm_limit")?,
            rpm_limit: row.try_get("rpm_limit")?,
            max_parallel_requests: row.try_get("max_parallel_requests")?,
            is_blocked: row.try_get("is_blocked")?,
        })
    }
}

/// A budget resolved to the entity holding it
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetRow {
    pub budget_id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub entity_alias: Option<String>,
    pub max_budget: Option<f64>,
    pub soft_budget: Option<f64>,
    pub budget_reset_at: Option<DateTime<Utc>>,
    pub current_spend: Option<f64>,
}

impl BudgetRow {
    pub fn new(
        budget_id: impl Into<String>,
        entity_type: EntityType,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            budget_id: budget_id.into(),
            entity_type,
            entity_id: entity_id.into(),
            entity_alias: None,
            max_budget: None,
            soft_budget: None,
            budget_reset_at: None,
            current_spend: None,
        }
    }
}

impl FromRow<'_, PgRow> for BudgetRow {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            budget_id: row.try_get("budget_id")?,
            entity_type: EntityType::decode(row, "entity_type")?,
            entity_id: row.try_get("entity_id")?,
            entity_alias: row.try_get("entity_alias")?,
            max_budget: row.try_get("max_budget")?,
            soft_budget: row.try_get("soft_budget")?,
            budget_reset_at: row.try_get("budget_reset_at")?,
            current_spend: row.try_get("current_spend")?,
        })
    }
}

/// An API key (verification token)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyStatusRow {
    pub token: String,
    pub key_name: Option<String>,
    pub key_alias: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub team_id: Option<String>,
    pub blocked: Option<bool>,
    pub spend: Option<f64>,
}

impl FromRow<'_, PgRow> for KeyStatusRow {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            token: row.try_get("token")?,
            key_name: row.try_get("key_name")?,
            key_alias: row.try_get("key_alias")?,
            expires: row.try_get("expires")?,
            user_id: row.try_get("user_id")?,
            team_id: row.try_get("team_id")?,
            blocked: row.try_get("blocked")?,
            spend: row.try_get("spend")?,
        })
    }
}
