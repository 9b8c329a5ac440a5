//! # Gantry
//!
//! An embeddable HTTP server framework built around nested route groups.
//!
//! A request resolves to one chain: every ancestor group's middleware, root
//! first, then the route's handler. The chain runs front to back; the first
//! handler that answers with a [`Response`](core::Response) stops it, and
//! anything a handler stores in the context is visible to the handlers
//! after it. Middleware registered on a group applies to routes added to
//! that group or any descendant, whenever they were added.
//!
//! | Crate               | Contents                                         |
//! |---------------------|--------------------------------------------------|
//! | [`core`]            | Context, handlers, responses, errors, JSON codec |
//! | [`router`]          | Radix tree router                                |
//! | [`server`]          | Groups, dispatcher, hyper server, static files   |
//! | [`middleware`]      | CORS and request logging                         |
//! | [`telemetry`]       | Logging setup, request records, metrics          |
//! | [`config`]          | Layered TOML/JSON/env configuration              |
//!
//! ## Example
//!
//! ```rust,no_run
//! use gantry::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().with_env_prefix("GANTRY").load()?;
//!     init_logging(&config.log_config())?;
//!
//!     let server = Server::new(config.server_config()).with_logger(TracingLogger::new());
//!     let root = server.root();
//!     root.use_handler(log_requests(false))?;
//!
//!     let api = root.sub_group(
//!         "/api",
//!         "api",
//!         [boxed(|ctx: &mut Context<'_>| ctx.set("api", true))],
//!     )?;
//!     api.get("/ping", |_: &mut Context<'_>| Response::json(serde_json::json!({ "ok": true })))?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/gantry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use gantry_core as core;

// Re-export routing
pub use gantry_router as router;

// Re-export server types
pub use gantry_server as server;

// Re-export middleware
pub use gantry_middleware as middleware;

// Re-export telemetry
pub use gantry_telemetry as telemetry;

// Re-export configuration
pub use gantry_config as config;

/// Prelude module for convenient imports.
///
/// ```rust
/// use gantry::prelude::*;
/// ```
pub mod prelude {
    pub use gantry_core::{
        boxed, handler, BoxHandler, Context, Handler, HttpError, HttpResult, Key, Lookup,
        Outcome, Response, ResponseWriter,
    };

    pub use gantry_server::{
        h2_client, Dispatcher, Group, RunningServer, Server, ServerConfig, ShutdownSignal,
        StaticDir,
    };

    pub use gantry_middleware::{log_requests, Cors, CorsBuilder};

    pub use gantry_telemetry::{init_logging, LogConfig, RequestInfo, RequestLogger, TracingLogger};

    pub use gantry_config::{ConfigLoader, GantryConfig};
}
