//! Per-request records and the logger that observes them.

use std::net::SocketAddr;
use std::time::Duration;

use gantry_core::RequestId;
use http::{Method, StatusCode};

use crate::metrics;

/// Summary of one completed request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Request ID assigned at dispatch.
    pub request_id: RequestId,
    /// Request method.
    pub method: Method,
    /// Request path, without the query string.
    pub path: String,
    /// Route pattern that matched, if any.
    pub route: Option<String>,
    /// Status committed to the sink.
    pub status: StatusCode,
    /// Time from dispatch to the end of rendering.
    pub duration: Duration,
    /// Body bytes written.
    pub bytes_written: u64,
    /// Whether a handler panicked.
    pub faulted: bool,
    /// Peer address, when served over a socket.
    pub remote_addr: Option<SocketAddr>,
}

/// Observer invoked once per completed request.
///
/// Runs outside the handler chain, after rendering.
pub trait RequestLogger: Send + Sync + 'static {
    /// Records one request.
    fn record(&self, info: &RequestInfo);
}

impl<F> RequestLogger for F
where
    F: Fn(&RequestInfo) + Send + Sync + 'static,
{
    fn record(&self, info: &RequestInfo) {
        self(info);
    }
}

/// Logs each request as a `tracing` event and updates the request metrics.
///
/// Server errors and faulted chains log at `warn`, everything else at
/// `info`.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    metrics: bool,
}

impl TracingLogger {
    /// Creates a logger that also records metrics.
    #[must_use]
    pub fn new() -> Self {
        Self { metrics: true }
    }

    /// Enables or disables metric updates.
    #[must_use]
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics = enabled;
        self
    }
}

impl RequestLogger for TracingLogger {
    fn record(&self, info: &RequestInfo) {
        let duration_ms = info.duration.as_secs_f64() * 1000.0;
        let remote = info.remote_addr.map(|a| a.to_string()).unwrap_or_default();
        let route = info.route.as_deref().unwrap_or("");

        if info.faulted || info.status.is_server_error() {
            tracing::warn!(
                request_id = %info.request_id,
                http.method = %info.method,
                http.path = %info.path,
                http.route = route,
                http.status_code = info.status.as_u16(),
                duration_ms,
                bytes_written = info.bytes_written,
                faulted = info.faulted,
                remote_addr = %remote,
                "request completed"
            );
        } else {
            tracing::info!(
                request_id = %info.request_id,
                http.method = %info.method,
                http.path = %info.path,
                http.route = route,
                http.status_code = info.status.as_u16(),
                duration_ms,
                bytes_written = info.bytes_written,
                remote_addr = %remote,
                "request completed"
            );
        }

        if self.metrics {
            metrics::record_request(
                info.method.as_str(),
                info.status.as_u16(),
                info.duration,
                info.faulted,
            );
        }
    }
}
