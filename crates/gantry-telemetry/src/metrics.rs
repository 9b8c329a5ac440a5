//! Request metrics.
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! every call is a no-op.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Total requests, labelled by `method` and `status`.
pub const REQUESTS_TOTAL: &str = "gantry_requests_total";

/// Request handling time in seconds, labelled by `method`.
pub const REQUEST_DURATION_SECONDS: &str = "gantry_request_duration_seconds";

/// Handler panics, labelled by `method`.
pub const HANDLER_FAULTS_TOTAL: &str = "gantry_handler_faults_total";

/// Registers descriptions for the standard metrics.
///
/// Call once after installing a recorder.
pub fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests dispatched");
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        "Time from dispatch to the end of rendering, in seconds"
    );
    describe_counter!(HANDLER_FAULTS_TOTAL, "Handler panics recovered by the chain runner");
}

/// Records one completed request.
pub fn record_request(method: &str, status_code: u16, duration: Duration, faulted: bool) {
    counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(REQUEST_DURATION_SECONDS, "method" => method.to_string())
        .record(duration.as_secs_f64());

    if faulted {
        counter!(HANDLER_FAULTS_TOTAL, "method" => method.to_string()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_recorder() {
        describe_metrics();
        record_request("GET", 200, Duration::from_millis(3), false);
        record_request("POST", 500, Duration::from_millis(7), true);
    }
}
