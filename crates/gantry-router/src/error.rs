//! Route registration errors.

use http::Method;
use thiserror::Error;

/// Errors returned when a route cannot be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsertError {
    /// The method is already registered for an identical pattern.
    #[error("route {method} {pattern} is already registered")]
    Conflict {
        /// Conflicting method.
        method: Method,
        /// Pattern as given to the router.
        pattern: String,
    },

    /// The pattern is malformed.
    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// Pattern as given to the router.
        pattern: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}
