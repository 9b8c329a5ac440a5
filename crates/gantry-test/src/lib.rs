//! # Gantry Test
//!
//! Test utilities for Gantry: in-memory dispatch against a route tree,
//! without binding a port.
//!
//! - [`TestClient`] - Builds requests and dispatches them in memory
//! - [`TestResponse`] - Captured response with assertion helpers
//! - [`CapturingWriter`] - [`ResponseWriter`](gantry_core::ResponseWriter)
//!   double that records every status call
//!
//! ## Example
//!
//! ```
//! use gantry_core::{Context, Response};
//! use gantry_server::Group;
//! use gantry_test::TestClient;
//! use http::StatusCode;
//!
//! let root = Group::root();
//! root.get("/ping", |_: &mut Context<'_>| {
//!     Response::json(serde_json::json!({ "ok": true }))
//! })
//! .unwrap();
//!
//! let client = TestClient::new(&root);
//! client
//!     .get("/ping")
//!     .send()
//!     .unwrap()
//!     .assert_status(StatusCode::OK)
//!     .assert_json_eq(&serde_json::json!({ "ok": true }));
//! ```

#![doc(html_root_url = "https://docs.rs/gantry-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod capture;
mod client;
mod error;
mod response;

pub use capture::CapturingWriter;
pub use client::{TestClient, TestRequest};
pub use error::TestError;
pub use response::TestResponse;
