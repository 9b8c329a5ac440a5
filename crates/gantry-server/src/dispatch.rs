//! Request dispatch.
//!
//! Resolves a request against a group tree, runs the composed chain on a
//! fresh [`Context`] and reports what was sent. The dispatcher is
//! synchronous; the server calls it from a blocking worker and tests call
//! it directly.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use gantry_core::{
    boxed, BoxHandler, BufferedWriter, Context, Params, Request, RequestId, Response,
    ResponseWriter,
};
use gantry_router::Match;
use gantry_telemetry::{RequestInfo, RequestLogger};
use http::{Method, StatusCode};

use crate::group::{effective_middleware, Group};

/// Outcome of route resolution.
pub enum Resolution {
    /// A route matched.
    Found {
        /// Inherited middleware, root first, then the route handler.
        chain: Vec<BoxHandler>,
        /// Captured path parameters.
        params: Params,
        /// The full pattern that matched.
        pattern: Arc<str>,
    },
    /// The path exists but not for this method.
    MethodNotAllowed {
        /// Methods registered on the path.
        allowed: Vec<Method>,
    },
    /// Nothing matches the path.
    NotFound,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found { chain, params, pattern } => f
                .debug_struct("Found")
                .field("chain_len", &chain.len())
                .field("params", params)
                .field("pattern", pattern)
                .finish(),
            Self::MethodNotAllowed { allowed } => f
                .debug_struct("MethodNotAllowed")
                .field("allowed", allowed)
                .finish(),
            Self::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Summary of one dispatched request.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Request ID given to the context.
    pub request_id: RequestId,
    /// Status committed to the sink.
    pub status: StatusCode,
    /// Body bytes written.
    pub bytes_written: u64,
    /// Whether a handler panicked or the response failed to encode.
    pub faulted: bool,
    /// Full pattern of the matched route.
    pub route: Option<String>,
    /// Time spent running and rendering the chain.
    pub duration: Duration,
}

/// Resolves requests against a group tree and runs their chains.
///
/// Cloning is cheap; clones share the tree and logger.
#[derive(Clone)]
pub struct Dispatcher {
    root: Group,
    logger: Option<Arc<dyn RequestLogger>>,
}

impl Dispatcher {
    /// Creates a dispatcher over the tree rooted at `root`.
    #[must_use]
    pub fn new(root: &Group) -> Self {
        Self {
            root: root.clone(),
            logger: None,
        }
    }

    /// Sets the observer called once after every request.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn RequestLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Returns the root group.
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Resolves `method` and `path` to a chain.
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution {
        let (entry, params) = {
            let router = self.root.table().router.read();
            match router.match_route(method, path) {
                Match::Found(found) => (found.value.clone(), found.params),
                Match::MethodNotAllowed { allowed } => {
                    return Resolution::MethodNotAllowed { allowed }
                }
                Match::NotFound => return Resolution::NotFound,
            }
        };

        // The owning group lives as long as the tree; a dead link means the
        // route belongs to a tree that is being torn down.
        let Some(owner) = entry.owner.upgrade() else {
            return Resolution::NotFound;
        };

        let mut chain = effective_middleware(&owner);
        chain.push(entry.handler);
        Resolution::Found {
            chain,
            params,
            pattern: entry.pattern,
        }
    }

    /// Resolves `request`, runs its chain against `writer` and renders the
    /// result.
    ///
    /// Never panics because of a handler; faults are reported in the
    /// returned [`DispatchReport`].
    pub fn dispatch(&self, request: Request, writer: &mut dyn ResponseWriter) -> DispatchReport {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let remote_addr = request.extensions().get::<SocketAddr>().copied();

        let (chain, params, route) = match self.resolve(&method, &path) {
            Resolution::Found {
                chain,
                params,
                pattern,
            } => (chain, params, Some(pattern.to_string())),
            Resolution::MethodNotAllowed { allowed } => {
                let reject = boxed(move |_: &mut Context<'_>| Response::method_not_allowed(&allowed));
                (vec![reject], Params::new(), None)
            }
            Resolution::NotFound => (Vec::new(), Params::new(), None),
        };

        let mut ctx = Context::new(request, writer)
            .with_params(params)
            .with_chain(chain);
        ctx.run();

        let report = DispatchReport {
            request_id: ctx.request_id(),
            status: ctx.writer().status(),
            bytes_written: ctx.writer().bytes_written(),
            faulted: ctx.faulted(),
            route,
            duration: ctx.elapsed(),
        };
        drop(ctx);

        if let Some(logger) = &self.logger {
            logger.record(&RequestInfo {
                request_id: report.request_id,
                method,
                path,
                route: report.route.clone(),
                status: report.status,
                duration: report.duration,
                bytes_written: report.bytes_written,
                faulted: report.faulted,
                remote_addr,
            });
        }

        report
    }

    /// Dispatches into memory and returns the complete response.
    pub fn dispatch_buffered(&self, request: Request) -> (http::Response<Bytes>, DispatchReport) {
        let mut writer = BufferedWriter::new();
        let report = self.dispatch(request, &mut writer);
        (writer.into_response(), report)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("root", &self.root)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}
