//! Client metrics.
//!
//! Instrumentation goes through the `metrics` facade; the binary decides
//! whether a recorder (and exporter) is installed.

use metrics::{counter, gauge};

/// Metric names.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "echochat_requests_total";
    pub const RESPONSES_TOTAL: &str = "echochat_responses_total";
    pub const ERRORS_TOTAL: &str = "echochat_errors_total";
    pub const RECONNECTS_TOTAL: &str = "echochat_reconnects_total";
    pub const PENDING_REQUESTS: &str = "echochat_pending_requests";
}

/// Register metric descriptions with the installed recorder.
pub fn describe() {
    metrics::describe_counter!(names::REQUESTS_TOTAL, "Requests sent, by operation");
    metrics::describe_counter!(names::RESPONSES_TOTAL, "Envelopes received, by status");
    metrics::describe_counter!(names::ERRORS_TOTAL, "Client errors, by kind");
    metrics::describe_counter!(names::RECONNECTS_TOTAL, "Reconnection attempts");
    metrics::describe_gauge!(
        names::PENDING_REQUESTS,
        "Requests awaiting a reply on the current connection"
    );
}

/// Record a request handed to the transport.
pub fn record_request(function: &'static str) {
    counter!(names::REQUESTS_TOTAL, "function" => function).increment(1);
}

/// Record a decoded incoming envelope.
pub fn record_response(status: &str) {
    counter!(names::RESPONSES_TOTAL, "status" => status.to_string()).increment(1);
}

/// Record an error.
pub fn record_error(kind: &'static str) {
    counter!(names::ERRORS_TOTAL, "kind" => kind).increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!(names::RECONNECTS_TOTAL).increment(1);
}

/// Update the outstanding request count.
pub fn set_pending_requests(count: usize) {
    gauge!(names::PENDING_REQUESTS).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder() {
        // No recorder installed: every call is a no-op
        describe();
        record_request("LIST_TOPICS");
        record_response("success");
        record_error("stale_reference");
        record_reconnect();
        set_pending_requests(3);
    }
}
