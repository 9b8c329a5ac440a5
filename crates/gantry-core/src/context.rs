//! Per-request context and chain runner.
//!
//! A [`Context`] is created for one request, runs the resolved handler chain
//! front to back, renders at most one response and is then dropped.

use std::any::Any;
use std::io;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use bytes::Bytes;
use gantry_router::Params;
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::JsonCodec;
use crate::error::{HttpError, RenderError};
use crate::handler::{BoxHandler, Outcome};
use crate::response::Response;
use crate::values::{Key, Lookup, Values};
use crate::writer::ResponseWriter;

/// An incoming request with its body fully read.
pub type Request = http::Request<Bytes>;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps request IDs sortable in logs.
///
/// # Example
///
/// ```
/// use gantry_core::RequestId;
///
/// let id = RequestId::new();
/// println!("Request ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Lifecycle of a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// Created, no handler has run.
    Pending,
    /// Handlers are executing.
    Running,
    /// The chain stopped; nothing rendered yet.
    Completed,
    /// Output has been produced. Terminal.
    Rendered,
}

/// Per-request state handed to every handler in the chain.
///
/// The context borrows the output sink for its lifetime `'w`; everything
/// else it owns.
///
/// # Execution
///
/// [`run`](Context::run) invokes the chain in order. A handler returning
/// [`Outcome::Proceed`] lets the next one run; the first
/// [`Outcome::Respond`] stops the chain and that response is rendered.
/// If no handler answers, the default not-found response is rendered. A
/// handler that writes to the sink directly also stops the chain, and
/// nothing further is rendered.
///
/// A panicking handler is caught here: the chain stops, the panic is logged
/// and a generic 500 is rendered.
pub struct Context<'w> {
    request_id: RequestId,
    request: Request,
    writer: &'w mut dyn ResponseWriter,
    params: Params,
    values: Values,
    chain: Vec<BoxHandler>,
    cursor: usize,
    state: ChainState,
    response: Option<Response>,
    faulted: bool,
    started_at: Instant,
}

impl<'w> Context<'w> {
    /// Creates a context with an empty chain.
    pub fn new(request: Request, writer: &'w mut dyn ResponseWriter) -> Self {
        Self {
            request_id: RequestId::new(),
            request,
            writer,
            params: Params::new(),
            values: Values::new(),
            chain: Vec::new(),
            cursor: 0,
            state: ChainState::Pending,
            response: None,
            faulted: false,
            started_at: Instant::now(),
        }
    }

    /// Sets the path parameters captured during routing.
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Sets the handler chain.
    #[must_use]
    pub fn with_chain(mut self, chain: Vec<BoxHandler>) -> Self {
        self.chain = chain;
        self
    }

    /// Sets the request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    // ------------------------------------------------------------------
    // Request
    // ------------------------------------------------------------------

    /// Returns the request ID.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// Returns the request path.
    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    /// Returns the first value of the query parameter `name`, url-decoded.
    pub fn query(&self, name: &str) -> Option<String> {
        let query = self.request.uri().query()?;
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
        pairs.into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Returns a request header as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name)?.to_str().ok()
    }

    /// Returns the path parameter `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Returns all path parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Returns the request body.
    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    /// Decodes the request body as JSON.
    ///
    /// A malformed body becomes a bad request error.
    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        JsonCodec::decode(self.request.body())
            .map_err(|err| HttpError::bad_request(format!("invalid JSON body: {err}")))
    }

    /// Returns the peer address, if the server recorded one.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.request.extensions().get::<SocketAddr>().copied()
    }

    // ------------------------------------------------------------------
    // Scratch values
    // ------------------------------------------------------------------

    /// Returns the scratch store.
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Returns the scratch store for modification.
    pub fn values_mut(&mut self) -> &mut Values {
        &mut self.values
    }

    /// Stores a scratch value for later handlers.
    pub fn set<T: Any + Send>(&mut self, key: impl Into<Key>, value: T) {
        self.values.insert(key, value);
    }

    /// Looks up a scratch value.
    pub fn get<T: Any>(&self, key: impl Into<Key>) -> Lookup<&T> {
        self.values.get(key)
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// Returns the output sink.
    pub fn writer(&self) -> &dyn ResponseWriter {
        &*self.writer
    }

    /// Returns the output sink for direct writes.
    pub fn writer_mut(&mut self) -> &mut dyn ResponseWriter {
        &mut *self.writer
    }

    /// Returns the response headers for modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.writer.headers_mut()
    }

    /// Writes body bytes directly to the sink.
    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    /// Sets the response status directly on the sink.
    pub fn set_status(&mut self, status: StatusCode) {
        self.writer.set_status(status);
    }

    // ------------------------------------------------------------------
    // Chain
    // ------------------------------------------------------------------

    /// Returns the chain state.
    pub fn state(&self) -> ChainState {
        self.state
    }

    /// Returns the index of the next handler to run.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the length of the chain.
    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    /// Returns the recorded response, if a handler returned one.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Returns true if a handler panicked or rendering failed.
    pub fn faulted(&self) -> bool {
        self.faulted
    }

    /// Returns the time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Runs the rest of the chain from the current position.
    ///
    /// Middleware that needs to act after downstream handlers calls this,
    /// then inspects [`response`](Context::response). The caller's own
    /// return value is ignored if a downstream handler already answered.
    pub fn next(&mut self) {
        if self.state == ChainState::Pending {
            self.state = ChainState::Running;
        }
        while self.cursor < self.chain.len()
            && self.response.is_none()
            && !self.writer.has_started()
        {
            let handler = BoxHandler::clone(&self.chain[self.cursor]);
            self.cursor += 1;

            match panic::catch_unwind(AssertUnwindSafe(|| handler.call(self))) {
                Ok(Outcome::Proceed) => {}
                Ok(Outcome::Respond(response)) => {
                    if self.response.is_none() {
                        self.response = Some(response);
                    }
                }
                Err(payload) => self.fault(&*payload),
            }
        }
    }

    /// Runs the whole chain and renders the outcome.
    pub fn run(&mut self) {
        if matches!(self.state, ChainState::Pending | ChainState::Running) {
            self.next();
            // Middleware may already have rendered from inside the chain.
            if self.state != ChainState::Rendered {
                self.state = ChainState::Completed;
            }
        }
        self.render();
    }

    /// Renders the recorded response, or the default not-found response.
    ///
    /// Only the first call has an effect. If a handler already wrote to the
    /// sink nothing is rendered.
    pub fn render(&mut self) {
        if self.state == ChainState::Rendered {
            return;
        }
        self.state = ChainState::Rendered;

        let response = self.response.take();
        if self.writer.has_started() {
            return;
        }
        let response = response.unwrap_or_else(Response::not_found);

        match response.render(&mut *self.writer) {
            Ok(()) => {}
            Err(RenderError::Codec(err)) => {
                tracing::error!(
                    request_id = %self.request_id,
                    path = %self.path(),
                    error = %err,
                    "failed to encode response"
                );
                self.render_fallback();
            }
            Err(RenderError::Io(err)) if !self.writer.has_started() => {
                tracing::error!(
                    request_id = %self.request_id,
                    path = %self.path(),
                    error = %err,
                    "failed to render response head"
                );
                self.render_fallback();
            }
            Err(RenderError::Io(err)) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    path = %self.path(),
                    error = %err,
                    "failed to write response"
                );
            }
        }
    }

    /// Replaces a response that failed before reaching the client with a
    /// generic 500.
    fn render_fallback(&mut self) {
        self.faulted = true;
        if self.writer.has_started() {
            return;
        }
        if let Err(err) = Response::internal_error().render(&mut *self.writer) {
            tracing::warn!(request_id = %self.request_id, error = %err, "failed to write fallback response");
        }
    }

    fn fault(&mut self, payload: &(dyn Any + Send)) {
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload");

        tracing::error!(
            request_id = %self.request_id,
            method = %self.request.method(),
            path = %self.path(),
            handler_index = self.cursor - 1,
            panic = message,
            "handler panicked"
        );

        self.faulted = true;
        self.response = Some(Response::internal_error());
    }
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id)
            .field("method", self.request.method())
            .field("path", &self.path())
            .field("params", &self.params)
            .field("values", &self.values)
            .field("cursor", &self.cursor)
            .field("chain_len", &self.chain.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::boxed;
    use crate::writer::BufferedWriter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn request(uri: &str) -> Request {
        http::Request::builder()
            .uri(uri)
            .body(Bytes::new())
            .unwrap()
    }

    fn run_chain(chain: Vec<BoxHandler>) -> (http::Response<Bytes>, bool) {
        let mut sink = BufferedWriter::new();
        let mut ctx = Context::new(request("/"), &mut sink).with_chain(chain);
        ctx.run();
        let faulted = ctx.faulted();
        drop(ctx);
        (sink.into_response(), faulted)
    }

    #[test]
    fn test_empty_chain_renders_not_found() {
        let (out, faulted) = run_chain(Vec::new());
        assert_eq!(out.status(), StatusCode::NOT_FOUND);
        assert!(!faulted);
    }

    #[test]
    fn test_values_flow_down_the_chain() {
        let chain = vec![
            boxed(|ctx: &mut Context<'_>| ctx.set("mw", true)),
            boxed(|ctx: &mut Context<'_>| {
                if ctx.get::<bool>("mw") == Lookup::Found(&true) {
                    Response::json(serde_json::json!({"ok": true}))
                } else {
                    Response::not_found()
                }
            }),
        ];
        let (out, _) = run_chain(chain);
        assert_eq!(out.status(), StatusCode::OK);
        assert_eq!(out.body().as_ref(), br#"{"ok":true}"#);
    }

    #[test]
    fn test_first_response_wins() {
        let later = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&later);
        let chain = vec![
            boxed(|_: &mut Context<'_>| Response::no_content()),
            boxed(move |_: &mut Context<'_>| {
                counter.fetch_add(1, Ordering::SeqCst);
                Response::text("late")
            }),
        ];
        let (out, _) = run_chain(chain);
        assert_eq!(out.status(), StatusCode::NO_CONTENT);
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panic_becomes_internal_error() {
        let after = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&after);
        let chain = vec![
            boxed(|_: &mut Context<'_>| -> Outcome { panic!("boom") }),
            boxed(move |_: &mut Context<'_>| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        ];
        let (out, faulted) = run_chain(chain);
        assert_eq!(out.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(faulted);
        assert_eq!(after.load(Ordering::SeqCst), 0);
        assert!(!String::from_utf8_lossy(out.body()).contains("boom"));
    }

    #[test]
    fn test_direct_write_stops_chain_and_skips_render() {
        let chain = vec![
            boxed(|ctx: &mut Context<'_>| {
                ctx.set_status(StatusCode::ACCEPTED);
                ctx.write(b"streamed").map(|_| ()).ok();
            }),
            boxed(|_: &mut Context<'_>| Response::text("never")),
        ];
        let (out, _) = run_chain(chain);
        assert_eq!(out.status(), StatusCode::ACCEPTED);
        assert_eq!(out.body().as_ref(), b"streamed");
    }

    #[test]
    fn test_next_runs_downstream_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let chain = vec![
            boxed(|ctx: &mut Context<'_>| {
                ctx.next();
                assert_eq!(ctx.cursor(), ctx.chain_len());
                let status = ctx.response().map(Response::status);
                ctx.headers_mut().insert(
                    "x-downstream",
                    http::HeaderValue::from_static(if status.is_some() { "yes" } else { "no" }),
                );
            }),
            boxed(move |_: &mut Context<'_>| {
                counter.fetch_add(1, Ordering::SeqCst);
                Response::text("hi")
            }),
        ];
        let (out, _) = run_chain(chain);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(out.headers()["x-downstream"], "yes");
        assert_eq!(out.body().as_ref(), b"hi");
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut sink = BufferedWriter::new();
        let mut ctx = Context::new(request("/"), &mut sink)
            .with_chain(vec![boxed(|_: &mut Context<'_>| Response::text("once"))]);
        ctx.run();
        ctx.render();
        ctx.render();
        assert_eq!(ctx.state(), ChainState::Rendered);
        drop(ctx);
        assert_eq!(sink.body(), b"once");
    }

    const GENERIC_500: &[u8] =
        br#"{"error":{"code":"INTERNAL_ERROR","message":"internal server error"}}"#;

    #[test]
    fn test_unencodable_payload_becomes_internal_error() {
        let chain = vec![boxed(|_: &mut Context<'_>| {
            let mut by_pair = std::collections::BTreeMap::new();
            by_pair.insert((1u8, 2u8), "tuple keys are not JSON object keys");
            Response::json(by_pair)
        })];
        let (out, faulted) = run_chain(chain);
        assert_eq!(out.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(out.body().as_ref(), GENERIC_500);
        assert!(faulted);
    }

    #[test]
    fn test_invalid_redirect_becomes_internal_error() {
        let chain = vec![boxed(|_: &mut Context<'_>| Response::redirect("/a\nb"))];
        let (out, faulted) = run_chain(chain);
        assert_eq!(out.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(out.body().as_ref(), GENERIC_500);
        assert!(out.headers().get(http::header::LOCATION).is_none());
        assert!(faulted);
    }

    #[test]
    fn test_render_inside_chain_is_terminal() {
        let mut sink = BufferedWriter::new();
        let mut ctx = Context::new(request("/"), &mut sink).with_chain(vec![
            boxed(|ctx: &mut Context<'_>| {
                ctx.next();
                ctx.render();
            }),
            boxed(|_: &mut Context<'_>| Response::redirect("/a\nb")),
        ]);
        ctx.run();
        assert_eq!(ctx.state(), ChainState::Rendered);
        assert!(ctx.faulted());
        drop(ctx);

        let out = sink.into_response();
        assert_eq!(out.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(out.body().as_ref(), GENERIC_500);
    }

    #[test]
    fn test_render_inside_chain_keeps_response() {
        let mut sink = BufferedWriter::new();
        let mut ctx = Context::new(request("/"), &mut sink).with_chain(vec![
            boxed(|ctx: &mut Context<'_>| {
                ctx.next();
                ctx.render();
            }),
            boxed(|_: &mut Context<'_>| Response::text("inner")),
        ]);
        ctx.run();
        assert_eq!(ctx.state(), ChainState::Rendered);
        drop(ctx);

        let out = sink.into_response();
        assert_eq!(out.status(), StatusCode::OK);
        assert_eq!(out.body().as_ref(), b"inner");
    }

    #[test]
    fn test_render_before_run_uses_default() {
        let mut sink = BufferedWriter::new();
        let mut ctx = Context::new(request("/"), &mut sink);
        ctx.render();
        ctx.run();
        drop(ctx);
        assert_eq!(sink.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_query_and_params() {
        let mut sink = BufferedWriter::new();
        let params: Params = [("id".to_string(), "42".to_string())].into_iter().collect();
        let ctx = Context::new(request("/users/42?q=a%20b&q=c&x"), &mut sink).with_params(params);

        assert_eq!(ctx.param("id"), Some("42"));
        assert_eq!(ctx.query("q").as_deref(), Some("a b"));
        assert_eq!(ctx.query("x").as_deref(), Some(""));
        assert_eq!(ctx.query("missing"), None);
    }

    #[test]
    fn test_bind_json_bad_body() {
        #[derive(Debug, Deserialize)]
        struct Body {
            #[allow(dead_code)]
            name: String,
        }

        let mut sink = BufferedWriter::new();
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(Bytes::from_static(b"{nope"))
            .unwrap();
        let ctx = Context::new(req, &mut sink);
        let err = ctx.bind_json::<Body>().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
