//! Metrics collector
//!
//! One refresh cycle runs four independent sub-refreshes in order: spend,
//! rate limits, budgets and key status. A failing sub-refresh is logged and
//! skipped; the others still run and update their gauges.
//!
//! Derivations that cannot produce a meaningful value (zero or missing max
//! budget, timestamps already in the past, null fields) leave the affected
//! series untouched for the cycle. Nothing is ever cleared, so a series that
//! disappears from the query results keeps its last value.

use crate::datasource::MetricSource;
use crate::error::ExporterError;
use crate::metrics::{self as m, MetricRegistry};
use crate::rows::{BudgetRow, EntityLimitRow, KeyStatusRow, SpendAggregateRow};
use crate::window::TimeWindow;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Label used when an alias or key name is null
pub const NONE_LABEL: &str = "none";
/// Label used when a spend row has no model
pub const UNKNOWN_MODEL: &str = "unknown";

/// The four independent steps of a refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubRefresh {
    Spend,
    RateLimits,
    Budgets,
    KeyStatus,
}

impl SubRefresh {
    pub const ALL: [SubRefresh; 4] = [
        SubRefresh::Spend,
        SubRefresh::RateLimits,
        SubRefresh::Budgets,
        SubRefresh::KeyStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spend => "spend",
            Self::RateLimits => "rate_limits",
            Self::Budgets => "budgets",
            Self::KeyStatus => "key_status",
        }
    }
}

/// Result of one sub-refresh: rows folded into the registry, or the error
#[derive(Debug)]
pub struct SubRefreshOutcome {
    pub kind: SubRefresh,
    pub result: Result<usize, ExporterError>,
    pub duration: Duration,
}

/// Summary of one refresh cycle
#[derive(Debug)]
pub struct RefreshReport {
    pub outcomes: Vec<SubRefreshOutcome>,
    pub duration: Duration,
}

impl RefreshReport {
    pub fn outcome(&self, kind: SubRefresh) -> Option<&SubRefreshOutcome> {
        self.outcomes.iter().find(|o| o.kind == kind)
    }

    pub fn succeeded(&self, kind: SubRefresh) -> bool {
        self.outcome(kind).is_some_and(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures() == 0
    }
}

/// Budget utilization in percent
///
/// `None` when the max budget is zero or not a finite number.
pub fn utilization(current_spend: f64, max_budget: f64) -> Option<f64> {
    if max_budget == 0.0 || !max_budget.is_finite() {
        return None;
    }
    let value = current_spend / max_budget * 100.0;
    value.is_finite().then_some(value)
}

/// Seconds from `now` until `at`, `None` unless `at` is in the future
pub fn seconds_until(at: DateTime<Utc>, now: DateTime<Utc>) -> Option<f64> {
    let seconds = (at - now).num_milliseconds() as f64 / 1000.0;
    (seconds > 0.0).then_some(seconds)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn label_or<'a>(value: &'a Option<String>, fallback: &'a str) -> &'a str {
    present(value).unwrap_or(fallback)
}

/// Sums values per series within one cycle, then writes each series once
#[derive(Default)]
struct SeriesTotals {
    totals: BTreeMap<(&'static str, Vec<(&'static str, String)>), f64>,
}

impl SeriesTotals {
    fn add(&mut self, name: &'static str, labels: &[(&'static str, &str)], value: f64) {
        let labels = labels.iter().map(|(k, v)| (*k, v.to_string())).collect();
        *self.totals.entry((name, labels)).or_insert(0.0) += value;
    }

    fn flush(self, registry: &MetricRegistry) {
        for ((name, labels), value) in self.totals {
            let labels: Vec<(&'static str, &str)> =
                labels.iter().map(|(k, v)| (*k, v.as_str())).collect();
            registry.set(name, &labels, value);
        }
    }
}

/// Pulls rows from a [`MetricSource`] and folds them into a [`MetricRegistry`]
pub struct MetricsCollector {
    source: Arc<dyn MetricSource>,
    registry: Arc<MetricRegistry>,
    spend_window: TimeWindow,
}

impl MetricsCollector {
    pub fn new(
        source: Arc<dyn MetricSource>,
        registry: Arc<MetricRegistry>,
        spend_window: TimeWindow,
    ) -> Self {
        Self {
            source,
            registry,
            spend_window,
        }
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Run one full cycle against the current time
    pub async fn refresh(&self) -> RefreshReport {
        self.refresh_at(Utc::now()).await
    }

    /// Run one full cycle, evaluating time-based derivations against `now`
    pub async fn refresh_at(&self, now: DateTime<Utc>) -> RefreshReport {
        let started = Instant::now();
        let mut outcomes = Vec::with_capacity(SubRefresh::ALL.len());

        for kind in SubRefresh::ALL {
            let sub_started = Instant::now();
            let result = match kind {
                SubRefresh::Spend => self.refresh_spend().await,
                SubRefresh::RateLimits => self.refresh_rate_limits().await,
                SubRefresh::Budgets => self.refresh_budgets(now).await,
                SubRefresh::KeyStatus => self.refresh_key_status(now).await,
            };
            let duration = sub_started.elapsed();

            if let Err(e) = &result {
                tracing::error!(
                    collector = kind.as_str(),
                    error_kind = e.kind(),
                    error = %e,
                    "Sub-refresh failed, keeping previous values"
                );
            }

            self.record_outcome(kind, &result, duration);
            outcomes.push(SubRefreshOutcome {
                kind,
                result,
                duration,
            });
        }

        let report = RefreshReport {
            outcomes,
            duration: started.elapsed(),
        };

        tracing::debug!(
            duration_ms = report.duration.as_millis() as u64,
            failures = report.failures(),
            series = self.registry.len(),
            "Refresh cycle completed"
        );

        report
    }

    fn record_outcome(
        &self,
        kind: SubRefresh,
        result: &Result<usize, ExporterError>,
        duration: Duration,
    ) {
        let labels = [("collector", kind.as_str())];
        self.registry
            .set(m::COLLECTOR_DURATION, &labels, duration.as_secs_f64());

        match result {
            Ok(rows) => {
                self.registry.set(m::COLLECTOR_SUCCESS, &labels, 1.0);
                self.registry.set(m::COLLECTOR_ROWS, &labels, *rows as f64);
                self.registry.set(
                    m::COLLECTOR_LAST_SUCCESS,
                    &labels,
                    Utc::now().timestamp_millis() as f64 / 1000.0,
                );
            }
            Err(_) => {
                self.registry.set(m::COLLECTOR_SUCCESS, &labels, 0.0);
            }
        }
    }

    async fn refresh_spend(&self) -> Result<usize, ExporterError> {
        let rows = self.source.spend_aggregates(&self.spend_window).await?;
        self.apply_spend(&rows);
        Ok(rows.len())
    }

    async fn refresh_rate_limits(&self) -> Result<usize, ExporterError> {
        let rows = self.source.rate_limits().await?;
        self.apply_rate_limits(&rows);
        Ok(rows.len())
    }

    async fn refresh_budgets(&self, now: DateTime<Utc>) -> Result<usize, ExporterError> {
        let rows = self.source.budgets().await?;
        self.apply_budgets(&rows, now);
        Ok(rows.len())
    }

    async fn refresh_key_status(&self, now: DateTime<Utc>) -> Result<usize, ExporterError> {
        let rows = self.source.key_statuses().await?;
        self.apply_key_status(&rows, now);
        Ok(rows.len())
    }

    /// Rows are grouped by model x user x team x organization, so several
    /// rows can share a model (or a user and model). Their values are summed
    /// so each series reports the whole window.
    fn apply_spend(&self, rows: &[SpendAggregateRow]) {
        let mut totals = SeriesTotals::default();

        for row in rows {
            let model = label_or(&row.model, UNKNOWN_MODEL);
            let spend = row.total_spend.unwrap_or(0.0);
            let by_model = [("model", model)];

            totals.add(m::TOTAL_SPEND, &by_model, spend);
            totals.add(m::TOTAL_TOKENS, &by_model, row.total_tokens.unwrap_or(0.0));
            totals.add(m::PROMPT_TOKENS, &by_model, row.prompt_tokens.unwrap_or(0.0));
            totals.add(
                m::COMPLETION_TOKENS,
                &by_model,
                row.completion_tokens.unwrap_or(0.0),
            );
            totals.add(m::REQUESTS_TOTAL, &by_model, row.request_count as f64);
            totals.add(m::CACHE_HITS, &by_model, row.cache_hits.unwrap_or(0) as f64);
            totals.add(m::CACHE_MISSES, &by_model, row.cache_misses.unwrap_or(0) as f64);

            if let Some(user_id) = present(&row.user_id) {
                totals.add(
                    m::USER_SPEND,
                    &[
                        ("user_id", user_id),
                        ("user_alias", label_or(&row.user_alias, NONE_LABEL)),
                        ("model", model),
                    ],
                    spend,
                );
            }

            if let Some(team_id) = present(&row.team_id) {
                totals.add(
                    m::TEAM_SPEND,
                    &[
                        ("team_id", team_id),
                        ("team_alias", label_or(&row.team_alias, NONE_LABEL)),
                        ("model", model),
                    ],
                    spend,
                );
            }

            if let Some(organization_id) = present(&row.organization_id) {
                totals.add(
                    m::ORG_SPEND,
                    &[
                        ("organization_id", organization_id),
                        (
                            "organization_alias",
                            label_or(&row.organization_alias, NONE_LABEL),
                        ),
                        ("model", model),
                    ],
                    spend,
                );
            }
        }

        totals.flush(&self.registry);
    }

    fn apply_rate_limits(&self, rows: &[EntityLimitRow]) {
        for row in rows {
            let labels = [
                ("entity_type", row.entity_type.as_str()),
                ("entity_id", row.entity_id.as_str()),
                ("entity_alias", label_or(&row.entity_alias, NONE_LABEL)),
            ];

            if let Some(tpm) = row.tpm_limit {
                self.registry.set(m::TPM_LIMIT, &labels, tpm as f64);
            }
            if let Some(rpm) = row.rpm_limit {
                self.registry.set(m::RPM_LIMIT, &labels, rpm as f64);
            }
            if let Some(parallel) = row.max_parallel_requests {
                self.registry.set(m::PARALLEL_REQUESTS, &labels, parallel as f64);
            }
            // An unblocked entity is never written, so a previously blocked
            // one keeps reporting 1.
            if row.is_blocked {
                self.registry.set(m::BLOCKED_STATUS, &labels, 1.0);
            }
        }
    }

    fn apply_budgets(&self, rows: &[BudgetRow], now: DateTime<Utc>) {
        for row in rows {
            let labels = [
                ("entity_type", row.entity_type.as_str()),
                ("entity_id", row.entity_id.as_str()),
                ("entity_alias", label_or(&row.entity_alias, NONE_LABEL)),
            ];

            if let Some(max_budget) = row.max_budget {
                self.registry.set(m::MAX_BUDGET, &labels, max_budget);

                if let Some(value) = row
                    .current_spend
                    .and_then(|spend| utilization(spend, max_budget))
                {
                    self.registry.set(m::BUDGET_UTILIZATION, &labels, value);
                }
            }

            if let Some(soft_budget) = row.soft_budget {
                self.registry.set(m::SOFT_BUDGET, &labels, soft_budget);
            }

            if let Some(seconds) = row.budget_reset_at.and_then(|at| seconds_until(at, now)) {
                self.registry.set(m::BUDGET_RESET_TIME, &labels, seconds);
            }
        }
    }

    fn apply_key_status(&self, rows: &[KeyStatusRow], now: DateTime<Utc>) {
        for row in rows {
            let labels = [
                ("key_name", label_or(&row.key_name, NONE_LABEL)),
                ("key_alias", label_or(&row.key_alias, NONE_LABEL)),
            ];

            if let Some(seconds) = row.expires.and_then(|at| seconds_until(at, now)) {
                self.registry.set(m::KEY_EXPIRY, &labels, seconds);
            }

            // Zero spend is a real value; only null is skipped.
            if let Some(spend) = row.spend {
                self.registry.set(m::KEY_SPEND, &labels, spend);
            }
        }
    }
}
