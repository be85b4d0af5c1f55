use dashmap::DashMap;
use metrics::{describe_gauge, gauge, Label};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

// Spend
pub const TOTAL_SPEND: &str = "litellm_total_spend";
pub const USER_SPEND: &str = "litellm_user_spend";
pub const TEAM_SPEND: &str = "litellm_team_spend";
pub const ORG_SPEND: &str = "litellm_org_spend";

// Tokens
pub const TOTAL_TOKENS: &str = "litellm_total_tokens";
pub const PROMPT_TOKENS: &str = "litellm_prompt_tokens";
pub const COMPLETION_TOKENS: &str = "litellm_completion_tokens";

// Requests
pub const REQUESTS_TOTAL: &str = "litellm_requests_total";
pub const CACHE_HITS: &str = "litellm_cache_hits_total";
pub const CACHE_MISSES: &str = "litellm_cache_misses_total";

// Rate limits
pub const TPM_LIMIT: &str = "litellm_tpm_limit";
pub const RPM_LIMIT: &str = "litellm_rpm_limit";
pub const PARALLEL_REQUESTS: &str = "litellm_parallel_requests";

// Budgets
pub const BUDGET_UTILIZATION: &str = "litellm_budget_utilization";
pub const MAX_BUDGET: &str = "litellm_max_budget";
pub const SOFT_BUDGET: &str = "litellm_soft_budget";
pub const BUDGET_RESET_TIME: &str = "litellm_budget_reset_time";

// Status
pub const BLOCKED_STATUS: &str = "litellm_blocked_status";

// Keys
pub const KEY_EXPIRY: &str = "litellm_key_expiry";
pub const KEY_SPEND: &str = "litellm_key_spend";

// Exporter self-monitoring
pub const EXPORTER_INFO: &str = "litellm_exporter_info";
pub const COLLECTOR_SUCCESS: &str = "litellm_exporter_collector_success";
pub const COLLECTOR_DURATION: &str = "litellm_exporter_collector_duration_seconds";
pub const COLLECTOR_LAST_SUCCESS: &str = "litellm_exporter_last_success_timestamp_seconds";
pub const COLLECTOR_ROWS: &str = "litellm_exporter_collector_rows";

const DESCRIPTIONS: &[(&str, &str)] = &[
    (TOTAL_SPEND, "Total spend across all users"),
    (USER_SPEND, "Spend by user"),
    (TEAM_SPEND, "Spend by team"),
    (ORG_SPEND, "Spend by organization"),
    (TOTAL_TOKENS, "Total tokens used"),
    (PROMPT_TOKENS, "Prompt tokens used"),
    (COMPLETION_TOKENS, "Completion tokens used"),
    (REQUESTS_TOTAL, "Total number of requests"),
    (CACHE_HITS, "Total number of cache hits"),
    (CACHE_MISSES, "Total number of cache misses"),
    (TPM_LIMIT, "Tokens per minute limit"),
    (RPM_LIMIT, "Requests per minute limit"),
    (PARALLEL_REQUESTS, "Maximum parallel requests"),
    (BUDGET_UTILIZATION, "Budget utilization percentage"),
    (MAX_BUDGET, "Maximum budget"),
    (SOFT_BUDGET, "Soft budget limit"),
    (BUDGET_RESET_TIME, "Time until budget reset in seconds"),
    (BLOCKED_STATUS, "Entity blocked status"),
    (KEY_EXPIRY, "Time until key expiry in seconds"),
    (KEY_SPEND, "Current spend for key"),
    (EXPORTER_INFO, "Exporter version information"),
    (COLLECTOR_SUCCESS, "Whether the last run of a collector succeeded (1=success, 0=failure)"),
    (COLLECTOR_DURATION, "Duration of the last run of a collector in seconds"),
    (COLLECTOR_LAST_SUCCESS, "Unix time of the last successful run of a collector"),
    (COLLECTOR_ROWS, "Rows processed by the last successful run of a collector"),
];

/// Identity of one gauge series: metric name plus its labels sorted by key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub name: &'static str,
    pub labels: Vec<(&'static str, String)>,
}

impl SeriesKey {
    fn new(name: &'static str, labels: &[(&'static str, &str)]) -> Self {
        let mut labels: Vec<(&'static str, String)> =
            labels.iter().map(|(k, v)| (*k, v.to_string())).collect();
        labels.sort_by(|a, b| a.0.cmp(b.0));
        Self { name, labels }
    }
}

/// Gauges published by the exporter
///
/// Owns a Prometheus recorder that is never installed as the process-wide
/// recorder, plus the last value written to every series. Values are only
/// ever overwritten: a series that stops appearing in query results keeps
/// reporting its last value.
pub struct MetricRegistry {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    values: DashMap<SeriesKey, f64>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let registry = Self {
            recorder,
            handle,
            values: DashMap::new(),
        };
        registry.describe_all();
        registry.set(EXPORTER_INFO, &[("version", env!("CARGO_PKG_VERSION"))], 1.0);
        registry
    }

    fn describe_all(&self) {
        metrics::with_local_recorder(&self.recorder, || {
            for (name, description) in DESCRIPTIONS {
                describe_gauge!(*name, *description);
            }
        });
    }

    /// Set a gauge series to `value`
    pub fn set(&self, name: &'static str, labels: &[(&'static str, &str)], value: f64) {
        let key = SeriesKey::new(name, labels);

        metrics::with_local_recorder(&self.recorder, || {
            let labels: Vec<Label> = key
                .labels
                .iter()
                .map(|(k, v)| Label::new(*k, v.clone()))
                .collect();
            gauge!(name, labels).set(value);
        });

        self.values.insert(key, value);
    }

    /// Last value written to a series, if any
    pub fn get(&self, name: &'static str, labels: &[(&'static str, &str)]) -> Option<f64> {
        self.values
            .get(&SeriesKey::new(name, labels))
            .map(|entry| *entry.value())
    }

    /// Number of series of a metric that hold a value
    pub fn series_count(&self, name: &str) -> usize {
        self.values.iter().filter(|entry| entry.key().name == name).count()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Prometheus text exposition of every series
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_series_present() {
        let registry = MetricRegistry::new();
        assert_eq!(
            registry.get(EXPORTER_INFO, &[("version", env!("CARGO_PKG_VERSION"))]),
            Some(1.0)
        );
        assert!(registry.render().contains(EXPORTER_INFO));
    }

    #[test]
    fn test_set_overwrites_per_label_tuple() {
        let registry = MetricRegistry::new();

        registry.set(TOTAL_SPEND, &[("model", "gpt-4")], 1.0);
        registry.set(TOTAL_SPEND, &[("model", "gpt-4")], 2.5);
        registry.set(TOTAL_SPEND, &[("model", "claude-3")], 4.0);

        assert_eq!(registry.get(TOTAL_SPEND, &[("model", "gpt-4")]), Some(2.5));
        assert_eq!(registry.get(TOTAL_SPEND, &[("model", "claude-3")]), Some(4.0));
        assert_eq!(registry.series_count(TOTAL_SPEND), 2);
    }

    #[test]
    fn test_label_order_does_not_matter() {
        let registry = MetricRegistry::new();
        registry.set(USER_SPEND, &[("user_id", "u1"), ("user_alias", "alice"), ("model", "gpt-4")], 3.0);

        assert_eq!(
            registry.get(USER_SPEND, &[("model", "gpt-4"), ("user_alias", "alice"), ("user_id", "u1")]),
            Some(3.0)
        );
    }

    #[test]
    fn test_registries_are_independent() {
        let first = MetricRegistry::new();
        let second = MetricRegistry::new();

        first.set(KEY_SPEND, &[("key_name", "k"), ("key_alias", "none")], 9.0);

        assert!(second.get(KEY_SPEND, &[("key_name", "k"), ("key_alias", "none")]).is_none());
        assert!(!second.render().contains("litellm_key_spend{"));
    }

    #[test]
    fn test_render_contains_help_and_value() {
        let registry = MetricRegistry::new();
        registry.set(TOTAL_SPEND, &[("model", "gpt-4")], 1.5);

        let text = registry.render();
        assert!(text.contains("# HELP litellm_total_spend Total spend across all users"));
        assert!(text.contains("litellm_total_spend{model=\"gpt-4\"} 1.5"));
    }
}
