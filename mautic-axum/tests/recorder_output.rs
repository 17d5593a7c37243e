#![cfg(feature = "metrics")]

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use mautic_axum::{ExporterState, METRICS_PATH, router};
use mautic_core::metrics::install_prometheus_recorder;
use mautic_core::test_utils::FixtureDatabase;
use tower::ServiceExt;

// Installs the process-global recorder; keep it the only test in this binary.
#[tokio::test]
async fn scrape_body_ends_with_exporter_health() {
    let recorder = install_prometheus_recorder().unwrap();
    let db = FixtureDatabase::new().await.unwrap();
    db.repeat("INSERT INTO {prefix}page_hits (url) VALUES ('/')", 2)
        .await
        .unwrap();
    let state = ExporterState::new(Arc::new(db.collector().unwrap())).with_recorder(recorder);

    let response = router(state)
        .oneshot(Request::get(METRICS_PATH).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();

    let database = body.find("mautic_page_hits_total 2").expect("database families");
    let health = body
        .find("mautic_exporter_scrapes_total{result=\"success\"} 1")
        .expect("exporter families");
    assert!(database < health);
    assert!(body.contains("mautic_exporter_last_scrape_success 1"));
}
