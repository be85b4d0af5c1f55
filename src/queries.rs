//! Read-only projections over the LiteLLM Postgres schema
//!
//! Queries never interpolate values into SQL text: parameters travel in
//! `MetricQuery::params` and are bound positionally (`$1`, `$2`, ...).

use crate::window::TimeWindow;

/// A query plus its positional text parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQuery {
    /// Short name used in logs and errors
    pub name: &'static str,
    pub sql: &'static str,
    pub params: Vec<String>,
}

const SPEND_AGGREGATE_SQL: &str = r#"
SELECT
    s.model AS model,
    SUM(s.spend)::float8 AS total_spend,
    SUM(s.total_tokens)::float8 AS total_tokens,
    SUM(s.prompt_tokens)::float8 AS prompt_tokens,
    SUM(s.completion_tokens)::float8 AS completion_tokens,
    COUNT(*)::int8 AS request_count,
    COUNT(CASE WHEN s.cache_hit = 'true' THEN 1 END)::int8 AS cache_hits,
    COUNT(CASE WHEN s.cache_hit = 'false' THEN 1 END)::int8 AS cache_misses,
    u.user_id AS user_id,
    u.user_alias AS user_alias,
    t.team_id AS team_id,
    t.team_alias AS team_alias,
    o.organization_id AS organization_id,
    o.organization_alias AS organization_alias
FROM "LiteLLM_SpendLogs" s
LEFT JOIN "LiteLLM_UserTable" u ON s."user" = u.user_id
LEFT JOIN "LiteLLM_TeamTable" t ON s.team_id = t.team_id
LEFT JOIN "LiteLLM_OrganizationTable" o ON t.organization_id = o.organization_id
WHERE s."startTime" >= NOW() - $1::interval
GROUP BY s.model, u.user_id, u.user_alias, t.team_id, t.team_alias,
         o.organization_id, o.organization_alias
"#;

// Users can be blocked through the end-user table even when the user row
// itself carries no limits.
const RATE_LIMITS_SQL: &str = r#"
SELECT
    'user' AS entity_type,
    u.user_id AS entity_id,
    u.user_alias AS entity_alias,
    u.tpm_limit::int8 AS tpm_limit,
    u.rpm_limit::int8 AS rpm_limit,
    u.max_parallel_requests::int8 AS max_parallel_requests,
    COALESCE(e.blocked, false) AS is_blocked
FROM "LiteLLM_UserTable" u
LEFT JOIN "LiteLLM_EndUserTable" e ON u.user_id = e.user_id
WHERE u.tpm_limit IS NOT NULL
   OR u.rpm_limit IS NOT NULL
   OR u.max_parallel_requests IS NOT NULL
   OR e.blocked = true

UNION ALL

SELECT
    'team' AS entity_type,
    t.team_id AS entity_id,
    t.team_alias AS entity_alias,
    t.tpm_limit::int8 AS tpm_limit,
    t.rpm_limit::int8 AS rpm_limit,
    t.max_parallel_requests::int8 AS max_parallel_requests,
    COALESCE(t.blocked, false) AS is_blocked
FROM "LiteLLM_TeamTable" t
WHERE t.tpm_limit IS NOT NULL
   OR t.rpm_limit IS NOT NULL
   OR t.max_parallel_requests IS NOT NULL
   OR t.blocked = true
"#;

// One branch per holder kind. A budget attaches through exactly one
// membership path, so the branches never overlap.
const BUDGETS_SQL: &str = r#"
SELECT
    b.budget_id AS budget_id,
    'user' AS entity_type,
    e.user_id AS entity_id,
    u.user_alias AS entity_alias,
    b.max_budget::float8 AS max_budget,
    b.soft_budget::float8 AS soft_budget,
    b.budget_reset_at AT TIME ZONE 'UTC' AS budget_reset_at,
    u.spend::float8 AS current_spend
FROM "LiteLLM_BudgetTable" b
JOIN "LiteLLM_EndUserTable" e ON e.budget_id = b.budget_id
LEFT JOIN "LiteLLM_UserTable" u ON u.user_id = e.user_id

UNION ALL

SELECT
    b.budget_id AS budget_id,
    'team' AS entity_type,
    tm.team_id AS entity_id,
    t.team_alias AS entity_alias,
    b.max_budget::float8 AS max_budget,
    b.soft_budget::float8 AS soft_budget,
    b.budget_reset_at AT TIME ZONE 'UTC' AS budget_reset_at,
    t.spend::float8 AS current_spend
FROM "LiteLLM_BudgetTable" b
JOIN "LiteLLM_TeamMembership" tm ON tm.budget_id = b.budget_id
LEFT JOIN "LiteLLM_TeamTable" t ON t.team_id = tm.team_id

UNION ALL

SELECT
    b.budget_id AS budget_id,
    'organization' AS entity_type,
    om.organization_id AS entity_id,
    o.organization_alias AS entity_alias,
    b.max_budget::float8 AS max_budget,
    b.soft_budget::float8 AS soft_budget,
    b.budget_reset_at AT TIME ZONE 'UTC' AS budget_reset_at,
    o.spend::float8 AS current_spend
FROM "LiteLLM_BudgetTable" b
JOIN "LiteLLM_OrganizationMembership" om ON om.budget_id = b.budget_id
LEFT JOIN "LiteLLM_OrganizationTable" o ON o.organization_id = om.organization_id
"#;

const KEY_STATUS_SQL: &str = r#"
SELECT
    token,
    key_name,
    key_alias,
    expires AT TIME ZONE 'UTC' AS expires,
    user_id,
    team_id,
    blocked,
    spend::float8 AS spend
FROM "LiteLLM_VerificationToken"
"#;

/// The four metric queries
pub struct MetricQuerySet;

impl MetricQuerySet {
    /// Spend, tokens, requests and cache hits over the trailing `window`
    pub fn spend_aggregate(window: &TimeWindow) -> MetricQuery {
        MetricQuery {
            name: "spend",
            sql: SPEND_AGGREGATE_SQL,
            params: vec![window.to_interval()],
        }
    }

    /// Users and teams with at least one limit set or a blocked flag
    pub fn rate_limits() -> MetricQuery {
        MetricQuery {
            name: "rate_limits",
            sql: RATE_LIMITS_SQL,
            params: Vec::new(),
        }
    }

    /// Budgets resolved to their user, team or organization holder
    pub fn budgets() -> MetricQuery {
        MetricQuery {
            name: "budgets",
            sql: BUDGETS_SQL,
            params: Vec::new(),
        }
    }

    pub fn key_status() -> MetricQuery {
        MetricQuery {
            name: "key_status",
            sql: KEY_STATUS_SQL,
            params: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spend_window_is_a_bound_parameter() {
        let window = TimeWindow::parse("30d").unwrap();
        let query = MetricQuerySet::spend_aggregate(&window);

        assert_eq!(query.params, vec!["30 days".to_string()]);
        assert!(query.sql.contains("$1::interval"));
        assert!(!query.sql.contains("30 days"));
    }

    #[test]
    fn test_spend_query_keeps_rows_without_team_or_org() {
        let window = TimeWindow::parse("1h").unwrap();
        let sql = MetricQuerySet::spend_aggregate(&window).sql;
        assert!(sql.contains(r#"LEFT JOIN "LiteLLM_UserTable""#));
        assert!(sql.contains(r#"LEFT JOIN "LiteLLM_TeamTable""#));
        assert!(sql.contains(r#"LEFT JOIN "LiteLLM_OrganizationTable""#));
    }

    #[test]
    fn test_parameterless_queries() {
        for query in [
            MetricQuerySet::rate_limits(),
            MetricQuerySet::budgets(),
            MetricQuerySet::key_status(),
        ] {
            assert!(query.params.is_empty(), "{} has params", query.name);
            assert!(!query.sql.contains('$'), "{} references a placeholder", query.name);
        }
    }

    #[test]
    fn test_budget_query_has_three_holder_branches() {
        let sql = MetricQuerySet::budgets().sql;
        assert_eq!(sql.matches("UNION ALL").count(), 2);
        assert!(sql.contains("'user' AS entity_type"));
        assert!(sql.contains("'team' AS entity_type"));
        assert!(sql.contains("'organization' AS entity_type"));
    }

    #[test]
    fn test_rate_limits_reads_end_user_blocked_flag() {
        let sql = MetricQuerySet::rate_limits().sql;
        assert!(sql.contains(r#"LEFT JOIN "LiteLLM_EndUserTable" e ON u.user_id = e.user_id"#));
        assert!(sql.contains("e.blocked = true"));
    }
}
