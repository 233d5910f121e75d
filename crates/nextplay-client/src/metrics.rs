//! API client metrics.
//!
//! - Request counters by operation and status
//! - Latency histograms
//! - Uploaded byte and poll counters

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "nextplay_api_requests_total";
    pub const LATENCY_SECONDS: &str = "nextplay_api_latency_seconds";
    pub const UPLOAD_BYTES_TOTAL: &str = "nextplay_upload_bytes_total";
    pub const POLL_ATTEMPTS_TOTAL: &str = "nextplay_poll_attempts_total";
}

/// Record metrics for a completed API request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

pub fn record_upload_bytes(bytes: u64) {
    counter!(names::UPLOAD_BYTES_TOTAL).increment(bytes);
}

/// Record one status poll and the state it returned.
pub fn record_poll(state: &str) {
    counter!(names::POLL_ATTEMPTS_TOTAL, "state" => state.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.starts_with("nextplay_"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
        assert!(names::POLL_ATTEMPTS_TOTAL.contains("poll"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request("create_upload_session", 200, 12.0);
        record_upload_bytes(1024);
        record_poll("processing");
    }
}
