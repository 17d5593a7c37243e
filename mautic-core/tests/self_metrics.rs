#![cfg(all(feature = "sqlite", feature = "metrics"))]

use mautic_core::metrics::install_prometheus_recorder;
use mautic_core::test_utils::FixtureDatabase;

// The recorder is process-global, so this binary holds a single test.
#[tokio::test]
async fn cycles_record_scrape_health() {
    let recorder = install_prometheus_recorder().expect("recorder");
    let db = FixtureDatabase::new().await.expect("fixture");
    let collector = db.collector().expect("collector");

    collector.collect().await.expect("healthy cycle");
    let text = recorder.render();
    assert!(text.contains("mautic_exporter_scrapes_total{result=\"success\"} 1"), "{}", text);
    assert!(text.contains("mautic_exporter_last_scrape_success 1"), "{}", text);
    assert!(text.contains("mautic_exporter_scrape_duration_seconds_count 1"), "{}", text);
    assert!(
        text.contains("mautic_exporter_query_duration_seconds_count{metric=\"leads_total\"} 1"),
        "{}",
        text
    );
    assert!(
        text.contains(
            "mautic_exporter_query_duration_seconds_count{metric=\"leads_in_segment_total\"} 1"
        ),
        "{}",
        text
    );

    db.execute("DROP TABLE {prefix}leads").await.expect("drop");
    collector.collect().await.expect_err("leads is gone");
    let text = recorder.render();
    assert!(text.contains("mautic_exporter_scrapes_total{result=\"error\"} 1"), "{}", text);
    assert!(text.contains("mautic_exporter_scrapes_total{result=\"success\"} 1"), "{}", text);
    assert!(text.contains("mautic_exporter_last_scrape_success 0"), "{}", text);
    assert!(text.contains("mautic_exporter_scrape_duration_seconds_count 2"), "{}", text);
    // Entries after the failing one are not queried.
    assert!(
        text.contains(
            "mautic_exporter_query_duration_seconds_count{metric=\"leads_in_segment_total\"} 1"
        ),
        "{}",
        text
    );
}
