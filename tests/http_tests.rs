// HTTP exposition tests against the in-process router

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use litellm_exporter::metrics::{MetricRegistry, BLOCKED_STATUS, TOTAL_SPEND};
use litellm_exporter::server::create_router;
use std::sync::Arc;
use tower::ServiceExt;

async fn get(registry: Arc<MetricRegistry>, uri: &str) -> (StatusCode, String, Option<String>) {
    let response = create_router(registry)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap(), content_type)
}

#[tokio::test]
async fn test_metrics_endpoint_renders_registry() {
    let registry = Arc::new(MetricRegistry::new());
    registry.set(TOTAL_SPEND, &[("model", "gpt-4")], 1.5);
    registry.set(
        BLOCKED_STATUS,
        &[("entity_type", "team"), ("entity_id", "t1"), ("entity_alias", "none")],
        1.0,
    );

    let (status, body, content_type) = get(registry, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/plain"));
    assert!(body.contains("# TYPE litellm_total_spend gauge"));
    assert!(body.contains("litellm_total_spend{model=\"gpt-4\"} 1.5"));
    assert!(body.contains("litellm_blocked_status{"));
    assert!(body.contains("entity_id=\"t1\""));
}

#[tokio::test]
async fn test_scrapes_are_idempotent() {
    let registry = Arc::new(MetricRegistry::new());
    registry.set(TOTAL_SPEND, &[("model", "gpt-4")], 2.0);

    let sorted = |text: String| {
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        lines.sort();
        lines
    };

    let (_, first, _) = get(registry.clone(), "/metrics").await;
    let (_, second, _) = get(registry, "/metrics").await;
    assert_eq!(sorted(first), sorted(second));
}

#[tokio::test]
async fn test_health_endpoint() {
    let (status, body, _) = get(Arc::new(MetricRegistry::new()), "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let (status, _, _) = get(Arc::new(MetricRegistry::new()), "/v1/chat/completions").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
