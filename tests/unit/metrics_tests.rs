// Metrics tests through the public API

use imgrelay::metrics::Metrics;
use std::sync::Arc;
use std::thread;

#[test]
fn test_counters_are_thread_safe() {
    let metrics = Arc::new(Metrics::new());
    let mut handles = Vec::new();

    for _ in 0..4 {
        let metrics = Arc::clone(&metrics);
        handles.push(thread::spawn(move || {
            for _ in 0..100 {
                metrics.increment_request_count();
                metrics.increment_status_count(200);
                metrics.increment_method_count("GET");
            }
        }));
    }
    for handle in handles {
        handle.join().expect("worker thread panicked");
    }

    assert_eq!(metrics.get_request_count(), 400);
    assert_eq!(metrics.get_status_count(200), 400);
    assert_eq!(metrics.get_method_count("GET"), 400);
}

#[test]
fn test_prometheus_export_shape() {
    let metrics = Metrics::new();
    metrics.increment_request_count();
    metrics.increment_status_count(502);
    metrics.increment_method_count("HEAD");
    metrics.increment_decision_count("proxy_origin");
    metrics.increment_upstream_error();
    metrics.record_duration(12.5);

    let output = metrics.export_prometheus();

    // Each family carries HELP and TYPE lines
    for family in [
        "http_requests_total",
        "http_requests_by_status_total",
        "http_requests_by_method_total",
        "routing_decisions_total",
        "upstream_transport_errors_total",
        "http_request_duration_ms",
        "http_active_connections",
    ] {
        assert!(
            output.contains(&format!("# HELP {}", family)),
            "missing HELP for {}",
            family
        );
        assert!(
            output.contains(&format!("# TYPE {}", family)),
            "missing TYPE for {}",
            family
        );
    }

    assert!(output.contains("http_requests_by_status_total{status=\"502\"} 1"));
    assert!(output.contains("http_requests_by_method_total{method=\"HEAD\"} 1"));
    assert!(output.contains("routing_decisions_total{decision=\"proxy_origin\"} 1"));
    assert!(output.contains("http_request_duration_ms{quantile=\"0.5\"} 12.5"));
}

#[test]
fn test_active_connections_track_in_flight_requests() {
    let metrics = Metrics::new();
    metrics.increment_active_connections();
    metrics.increment_active_connections();
    metrics.decrement_active_connections();
    assert_eq!(metrics.get_active_connections(), 1);
}
