//! HTTP server.
//!
//! Each listener gets an accept loop; each connection is served by hyper
//! (HTTP/1.1, plus h2c prior knowledge when enabled). Request bodies are
//! collected up front, then the handler chain runs on a blocking worker and
//! streams its output back to hyper through a bounded channel.
//!
//! # Example
//!
//! ```rust,no_run
//! use gantry_core::{Context, Response};
//! use gantry_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new(ServerConfig::builder().http_addr("127.0.0.1:8080").build());
//!     server
//!         .root()
//!         .get("/ping", |_: &mut Context<'_>| Response::text("pong"))?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use gantry_core::{BufferedWriter, ErrorEnvelope, Response};
use gantry_telemetry::RequestLogger;
use http::StatusCode;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::ServerError;
use crate::group::Group;
use crate::shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
use crate::stream::response_channel;

/// Body type of every response the server sends.
pub type ResponseBody = BoxBody<Bytes, Infallible>;

/// An HTTP server that owns a group tree.
///
/// Register routes on [`root()`](Server::root), then [`start`](Server::start)
/// or [`run`](Server::run). Starting seals the tree.
pub struct Server {
    config: ServerConfig,
    root: Group,
    logger: Option<Arc<dyn RequestLogger>>,
}

impl Server {
    /// Creates a server with an empty root group.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self::with_root(config, Group::root())
    }

    /// Creates a server around an existing group tree.
    #[must_use]
    pub fn with_root(config: ServerConfig, root: Group) -> Self {
        Self {
            config,
            root,
            logger: None,
        }
    }

    /// Sets the observer called once per completed request.
    #[must_use]
    pub fn with_logger<L: RequestLogger>(mut self, logger: L) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Returns the root group.
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns a dispatcher over this server's tree.
    pub fn dispatcher(&self) -> Dispatcher {
        let dispatcher = Dispatcher::new(&self.root);
        match &self.logger {
            Some(logger) => dispatcher.with_logger(Arc::clone(logger)),
            None => dispatcher,
        }
    }

    /// Binds every listener, seals the group tree and starts accepting.
    ///
    /// Nothing is accepted unless every address binds.
    pub async fn start(self) -> Result<RunningServer, ServerError> {
        self.start_with_shutdown(ShutdownSignal::new()).await
    }

    /// Like [`start`](Server::start), stopping when `shutdown` triggers.
    pub async fn start_with_shutdown(
        self,
        shutdown: ShutdownSignal,
    ) -> Result<RunningServer, ServerError> {
        let mut listeners = Vec::new();
        for addr in self.config.socket_addrs()? {
            let listener = TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
            listeners.push(listener);
        }

        self.root.seal();

        let state = Arc::new(ServiceState {
            dispatcher: self.dispatcher(),
            request_timeout: self.config.request_timeout(),
            max_body_size: self.config.max_body_size(),
            http2_enabled: self.config.http2_enabled(),
        });
        let tracker = ConnectionTracker::new();

        let mut addrs = Vec::with_capacity(listeners.len());
        let mut accept_tasks = Vec::with_capacity(listeners.len());
        for listener in listeners {
            let local = listener.local_addr()?;
            tracing::info!(addr = %local, http2 = state.http2_enabled, "server listening");
            addrs.push(local);
            accept_tasks.push(tokio::spawn(accept_loop(
                listener,
                Arc::clone(&state),
                shutdown.clone(),
                tracker.clone(),
            )));
        }

        Ok(RunningServer {
            addrs,
            shutdown,
            tracker,
            accept_tasks,
            shutdown_timeout: self.config.shutdown_timeout(),
        })
    }

    /// Runs until SIGINT or SIGTERM, then shuts down gracefully.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Runs until `shutdown` triggers, then shuts down gracefully.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        self.start_with_shutdown(shutdown).await?.wait().await
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// A started server.
#[derive(Debug)]
pub struct RunningServer {
    addrs: Vec<SocketAddr>,
    shutdown: ShutdownSignal,
    tracker: ConnectionTracker,
    accept_tasks: Vec<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl RunningServer {
    /// Returns the bound addresses, in configuration order.
    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Returns the signal that stops this server.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Returns the number of open connections.
    pub fn active_connections(&self) -> usize {
        self.tracker.active_connections()
    }

    /// Triggers shutdown and waits for open connections to finish.
    ///
    /// # Errors
    ///
    /// [`ServerError::ShutdownTimeout`] if connections are still open after
    /// the configured shutdown timeout.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        self.shutdown.trigger();
        self.wait().await
    }

    /// Waits for the shutdown signal, then for open connections to finish.
    pub async fn wait(self) -> Result<(), ServerError> {
        self.shutdown.recv().await;

        for task in self.accept_tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "accept loop failed");
            }
        }

        tracing::info!(
            timeout = ?self.shutdown_timeout,
            connections = self.tracker.active_connections(),
            "waiting for connections to close"
        );

        match tokio::time::timeout(self.shutdown_timeout, self.tracker.wait_for_shutdown()).await {
            Ok(()) => {
                tracing::info!("server stopped");
                Ok(())
            }
            Err(_) => {
                let remaining = self.tracker.active_connections();
                tracing::warn!(remaining, "shutdown timeout reached");
                Err(ServerError::ShutdownTimeout { remaining })
            }
        }
    }
}

struct ServiceState {
    dispatcher: Dispatcher,
    request_timeout: Duration,
    max_body_size: usize,
    http2_enabled: bool,
}

async fn accept_loop(
    listener: TcpListener,
    state: Arc<ServiceState>,
    shutdown: ShutdownSignal,
    tracker: ConnectionTracker,
) {
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, remote_addr)) => {
                    tokio::spawn(serve_connection(
                        stream,
                        remote_addr,
                        Arc::clone(&state),
                        shutdown.clone(),
                        tracker.acquire(),
                    ));
                }
                Err(e) => tracing::error!(error = %e, "failed to accept connection"),
            },
            () = shutdown.recv() => {
                tracing::debug!("accept loop stopping");
                break;
            }
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    state: Arc<ServiceState>,
    shutdown: ShutdownSignal,
    _token: ConnectionToken,
) {
    let http2 = state.http2_enabled;
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { Ok::<_, Infallible>(handle_request(&state, req, remote_addr).await) }
    });

    let builder = if http2 {
        auto::Builder::new(TokioExecutor::new())
    } else {
        auto::Builder::new(TokioExecutor::new()).http1_only()
    };
    let mut conn = pin!(builder.serve_connection(TokioIo::new(stream), service));
    let mut stopping = shutdown.recv();
    let mut draining = false;

    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(remote = %remote_addr, error = %e, "connection closed with error");
                }
                break;
            }
            () = &mut stopping, if !draining => {
                tracing::debug!(remote = %remote_addr, "draining connection");
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

async fn handle_request(
    state: &ServiceState,
    req: http::Request<Incoming>,
    remote_addr: SocketAddr,
) -> http::Response<ResponseBody> {
    let (mut parts, body) = req.into_parts();

    let body = match collect_body(body, state.max_body_size, state.request_timeout).await {
        Ok(body) => body,
        Err(rejection) => return immediate(rejection),
    };

    parts.extensions.insert(remote_addr);
    let request = http::Request::from_parts(parts, body);

    let (mut writer, head_rx, body) = response_channel();
    let dispatcher = state.dispatcher.clone();
    // Detached: a timed-out chain keeps running and its writes fail once
    // the response is gone.
    drop(tokio::task::spawn_blocking(move || {
        dispatcher.dispatch(request, &mut writer);
    }));

    match tokio::time::timeout(state.request_timeout, head_rx).await {
        Ok(Ok((status, headers))) => {
            let mut response = http::Response::new(body.boxed());
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        Ok(Err(_)) => {
            tracing::error!(remote = %remote_addr, "request worker ended without a response");
            immediate(Response::internal_error())
        }
        Err(_) => {
            tracing::warn!(remote = %remote_addr, "handler timed out before responding");
            immediate(error_response(
                StatusCode::GATEWAY_TIMEOUT,
                "HANDLER_TIMEOUT",
                "Handler did not respond in time",
            ))
        }
    }
}

/// Collects the request body, bounded in size and time.
async fn collect_body(body: Incoming, limit: usize, timeout: Duration) -> Result<Bytes, Response> {
    match tokio::time::timeout(timeout, Limited::new(body, limit).collect()).await {
        Ok(Ok(collected)) => Ok(collected.to_bytes()),
        Ok(Err(e)) if e.downcast_ref::<LengthLimitError>().is_some() => Err(error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            "PAYLOAD_TOO_LARGE",
            &format!("Request body exceeds {limit} bytes"),
        )),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "failed to read request body");
            Err(error_response(
                StatusCode::BAD_REQUEST,
                "BODY_READ_ERROR",
                "Failed to read request body",
            ))
        }
        Err(_) => Err(error_response(
            StatusCode::REQUEST_TIMEOUT,
            "REQUEST_TIMEOUT",
            "Request body collection timed out",
        )),
    }
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    Response::json_with_status(status, ErrorEnvelope::new(code, message))
}

/// Renders a response produced outside any chain.
fn immediate(response: Response) -> http::Response<ResponseBody> {
    let mut writer = BufferedWriter::new();
    if let Err(e) = response.render(&mut writer) {
        tracing::error!(error = %e, "failed to render server response");
    }
    writer.into_response().map(|body| Full::new(body).boxed())
}
