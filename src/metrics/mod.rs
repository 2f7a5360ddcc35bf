// Metrics module - Prometheus-compatible metrics tracking
// Provides counters, histograms, and gauges for observability

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Histogram represents percentile statistics for latency measurements
#[derive(Debug, Clone, Copy)]
pub struct Histogram {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Metrics struct tracks counters and histograms for Prometheus export
/// Thread-safe via atomic operations and mutexes
pub struct Metrics {
    // Request counters
    request_count: AtomicU64,

    // Status code counters (e.g., 200, 302, 502)
    status_counts: Mutex<HashMap<u16, u64>>,

    // HTTP method counters (GET, HEAD, POST, etc.)
    method_counts: Mutex<HashMap<String, u64>>,

    // Routing decision counters (proxy_origin, redirect_optimizer, ...)
    decision_counts: Mutex<HashMap<&'static str, u64>>,

    // Upstream transport failures mapped to 502
    upstream_errors: AtomicU64,

    // Duration tracking (stored in microseconds as u64)
    durations: Mutex<Vec<u64>>,

    // In-flight requests gauge
    active_connections: AtomicU64,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Metrics {
            request_count: AtomicU64::new(0),
            status_counts: Mutex::new(HashMap::new()),
            method_counts: Mutex::new(HashMap::new()),
            decision_counts: Mutex::new(HashMap::new()),
            upstream_errors: AtomicU64::new(0),
            durations: Mutex::new(Vec::new()),
            active_connections: AtomicU64::new(0),
        }
    }

    pub fn increment_request_count(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_status_count(&self, status_code: u16) {
        if let Ok(mut counts) = self.status_counts.lock() {
            *counts.entry(status_code).or_insert(0) += 1;
        }
    }

    pub fn increment_method_count(&self, method: &str) {
        if let Ok(mut counts) = self.method_counts.lock() {
            *counts.entry(method.to_string()).or_insert(0) += 1;
        }
    }

    pub fn increment_decision_count(&self, decision: &'static str) {
        if let Ok(mut counts) = self.decision_counts.lock() {
            *counts.entry(decision).or_insert(0) += 1;
        }
    }

    pub fn increment_upstream_error(&self) {
        self.upstream_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duration(&self, duration_ms: f64) {
        if let Ok(mut durations) = self.durations.lock() {
            durations.push((duration_ms * 1000.0) as u64);
        }
    }

    pub fn increment_active_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        // Saturating: a decrement without a matching increment stays at 0
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }

    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn get_status_count(&self, status_code: u16) -> u64 {
        self.status_counts
            .lock()
            .ok()
            .and_then(|counts| counts.get(&status_code).copied())
            .unwrap_or(0)
    }

    pub fn get_method_count(&self, method: &str) -> u64 {
        self.method_counts
            .lock()
            .ok()
            .and_then(|counts| counts.get(method).copied())
            .unwrap_or(0)
    }

    pub fn get_decision_count(&self, decision: &str) -> u64 {
        self.decision_counts
            .lock()
            .ok()
            .and_then(|counts| counts.get(decision).copied())
            .unwrap_or(0)
    }

    pub fn get_upstream_error_count(&self) -> u64 {
        self.upstream_errors.load(Ordering::Relaxed)
    }

    pub fn get_active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn get_duration_histogram(&self) -> Histogram {
        let durations = match self.durations.lock() {
            Ok(durations) => durations.clone(),
            Err(_) => Vec::new(),
        };
        Self::percentiles(durations)
    }

    fn percentiles(mut values: Vec<u64>) -> Histogram {
        if values.is_empty() {
            return Histogram {
                p50: 0.0,
                p90: 0.0,
                p95: 0.0,
                p99: 0.0,
            };
        }
        values.sort_unstable();
        let pick = |p: f64| -> f64 {
            let idx = ((values.len() as f64 * p).ceil() as usize).saturating_sub(1);
            values[idx.min(values.len() - 1)] as f64 / 1000.0
        };
        Histogram {
            p50: pick(0.50),
            p90: pick(0.90),
            p95: pick(0.95),
            p99: pick(0.99),
        }
    }

    /// Export all metrics in Prometheus text exposition format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP http_requests_total Total number of HTTP requests received\n");
        output.push_str("# TYPE http_requests_total counter\n");
        output.push_str(&format!(
            "http_requests_total {}\n",
            self.request_count.load(Ordering::Relaxed)
        ));

        output.push_str("\n# HELP http_requests_by_status_total HTTP requests by status code\n");
        output.push_str("# TYPE http_requests_by_status_total counter\n");
        if let Ok(counts) = self.status_counts.lock() {
            for (status, count) in counts.iter() {
                output.push_str(&format!(
                    "http_requests_by_status_total{{status=\"{}\"}} {}\n",
                    status, count
                ));
            }
        }

        output.push_str("\n# HELP http_requests_by_method_total HTTP requests by method\n");
        output.push_str("# TYPE http_requests_by_method_total counter\n");
        if let Ok(counts) = self.method_counts.lock() {
            for (method, count) in counts.iter() {
                output.push_str(&format!(
                    "http_requests_by_method_total{{method=\"{}\"}} {}\n",
                    method, count
                ));
            }
        }

        output.push_str(
            "\n# HELP routing_decisions_total Requests by routing decision\n",
        );
        output.push_str("# TYPE routing_decisions_total counter\n");
        if let Ok(counts) = self.decision_counts.lock() {
            for (decision, count) in counts.iter() {
                output.push_str(&format!(
                    "routing_decisions_total{{decision=\"{}\"}} {}\n",
                    decision, count
                ));
            }
        }

        output.push_str(
            "\n# HELP upstream_transport_errors_total Outbound fetches that failed at the transport level\n",
        );
        output.push_str("# TYPE upstream_transport_errors_total counter\n");
        output.push_str(&format!(
            "upstream_transport_errors_total {}\n",
            self.upstream_errors.load(Ordering::Relaxed)
        ));

        output.push_str("\n# HELP http_request_duration_ms Request duration percentiles\n");
        output.push_str("# TYPE http_request_duration_ms summary\n");
        let histogram = self.get_duration_histogram();
        output.push_str(&format!(
            "http_request_duration_ms{{quantile=\"0.5\"}} {}\n",
            histogram.p50
        ));
        output.push_str(&format!(
            "http_request_duration_ms{{quantile=\"0.9\"}} {}\n",
            histogram.p90
        ));
        output.push_str(&format!(
            "http_request_duration_ms{{quantile=\"0.95\"}} {}\n",
            histogram.p95
        ));
        output.push_str(&format!(
            "http_request_duration_ms{{quantile=\"0.99\"}} {}\n",
            histogram.p99
        ));

        output.push_str("\n# HELP http_active_connections Current in-flight requests\n");
        output.push_str("# TYPE http_active_connections gauge\n");
        output.push_str(&format!(
            "http_active_connections {}\n",
            self.active_connections.load(Ordering::Relaxed)
        ));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
