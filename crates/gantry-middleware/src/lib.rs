//! # Gantry Middleware
//!
//! Ready-made middleware for Gantry groups. Middleware here is an ordinary
//! [`Handler`](gantry_core::Handler) registered with
//! [`Group::use_handler`](gantry_server::Group::use_handler); there is no
//! separate middleware trait.
//!
//! | Middleware        | Purpose                                          |
//! |-------------------|--------------------------------------------------|
//! | [`Cors`]          | CORS response headers and preflight answers      |
//! | [`log_requests`]  | One `tracing` event per routed request           |
//!
//! Panics in handlers are already contained by the chain runner, so there
//! is no recovery middleware.
//!
//! ## Example
//!
//! ```
//! use gantry_core::{Context, Response};
//! use gantry_middleware::{log_requests, Cors};
//! use gantry_server::Group;
//!
//! let root = Group::root();
//! root.use_handler(log_requests(false)).unwrap();
//! root.use_handler(Cors::permissive()).unwrap();
//! Cors::permissive().install(&[&root]).unwrap();
//!
//! root.get("/ping", |_: &mut Context<'_>| Response::text("pong")).unwrap();
//! ```

#![doc(html_root_url = "https://docs.rs/gantry-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cors;
mod logging;

pub use cors::{Cors, CorsBuilder};
pub use logging::log_requests;
