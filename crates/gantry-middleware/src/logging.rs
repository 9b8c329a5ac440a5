//! Per-request logging middleware.

use gantry_core::{Context, Handler};
use http::header::USER_AGENT;

/// Returns middleware that logs one `tracing` event per request.
///
/// The event is emitted after the rest of the chain has run, so it carries
/// the final status. `verbose` adds the peer address, user agent and
/// response size. Requests that fault log at `warn`.
///
/// This is independent of the logger installed with
/// [`Server::with_logger`](gantry_server::Server::with_logger), which also
/// covers requests that never reach a route.
pub fn log_requests(verbose: bool) -> impl Handler {
    move |ctx: &mut Context<'_>| {
        ctx.next();
        ctx.render();

        let status = ctx.writer().status().as_u16();
        let duration_ms = ctx.elapsed().as_secs_f64() * 1000.0;

        if ctx.faulted() {
            tracing::warn!(
                request_id = %ctx.request_id(),
                http.method = %ctx.method(),
                http.path = %ctx.path(),
                http.status_code = status,
                duration_ms,
                "request faulted"
            );
        } else if verbose {
            tracing::info!(
                request_id = %ctx.request_id(),
                http.method = %ctx.method(),
                http.path = %ctx.path(),
                http.status_code = status,
                duration_ms,
                bytes_written = ctx.writer().bytes_written(),
                remote_addr = %ctx.remote_addr().map(|a| a.to_string()).unwrap_or_default(),
                user_agent = ctx.header(USER_AGENT.as_str()).unwrap_or(""),
                "request"
            );
        } else {
            tracing::info!(
                http.method = %ctx.method(),
                http.path = %ctx.path(),
                http.status_code = status,
                duration_ms,
                "request"
            );
        }
    }
}
