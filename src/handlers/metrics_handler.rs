use crate::metrics::MetricRegistry;
use axum::{extract::State, http::header, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Handle /metrics endpoint
///
/// Serves whatever the registry holds; a scrape never triggers a query.
pub async fn metrics(State(registry): State<Arc<MetricRegistry>>) -> impl IntoResponse {
    let body = registry.render();
    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}
