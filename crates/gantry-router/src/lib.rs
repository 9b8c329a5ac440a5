//! Radix tree router for Gantry.
//!
//! The router maps `(method, path pattern)` pairs to arbitrary values and
//! resolves request paths in time proportional to the number of segments.
//! The dispatch core stores route entries in it; the router itself knows
//! nothing about handlers.
//!
//! # Pattern syntax
//!
//! - **Literal**: `/users/me`
//! - **Parameter**: `/users/{id}` or `/users/:id`
//! - **Wildcard**: `/files/*path` (last segment only; `*` alone captures under
//!   the name `*`)
//!
//! # Example
//!
//! ```rust
//! use gantry_router::{Match, Router};
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.insert(Method::GET, "/users/{id}", "getUser").unwrap();
//!
//! let Match::Found(m) = router.match_route(&Method::GET, "/users/123") else {
//!     panic!("route should match");
//! };
//! assert_eq!(*m.value, "getUser");
//! assert_eq!(m.params.get("id"), Some("123"));
//! ```
//!
//! # Architecture
//!
//! ```text
//!                    (root)
//!                      │
//!              ┌───────┴───────┐
//!              │               │
//!            "users"        "files"
//!              │          ┌────┴────┐
//!            "{id}"   "special"   "*path"
//! ```

mod error;
mod method_router;
mod node;
mod params;
mod router;

pub use error::InsertError;
pub use method_router::MethodRouter;
pub use node::{Node, SegmentKind};
pub use params::Params;
pub use router::Router;

use http::Method;

/// A successful match: the registered value and the captured parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a, T> {
    /// The value registered for the route.
    pub value: &'a T,
    /// Captured path parameters.
    pub params: Params,
}

impl<'a, T> RouteMatch<'a, T> {
    /// Creates a new route match.
    #[must_use]
    pub fn new(value: &'a T, params: Params) -> Self {
        Self { value, params }
    }
}

/// Result of matching a request against a [`Router`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match<'a, T> {
    /// Path and method both matched.
    Found(RouteMatch<'a, T>),
    /// The path matched but no value is registered for the method.
    MethodNotAllowed {
        /// Methods registered on the matched path.
        allowed: Vec<Method>,
    },
    /// No pattern matched the path.
    NotFound,
}
