//! Server lifecycle errors.

use std::io;

use thiserror::Error;

/// Errors from starting or stopping a [`Server`](crate::Server).
#[derive(Debug, Error)]
pub enum ServerError {
    /// A listener address could not be parsed.
    #[error("invalid listen address {addr:?}: {reason}")]
    InvalidAddress {
        /// The configured address.
        addr: String,
        /// Parser message.
        reason: String,
    },

    /// Binding a listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that failed.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Open connections did not finish within the shutdown timeout.
    #[error("{remaining} connection(s) still open after shutdown timeout")]
    ShutdownTimeout {
        /// Connections still open when the timeout expired.
        remaining: usize,
    },

    /// I/O error during server operation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:80".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "failed to bind 127.0.0.1:80: denied");

        let err = ServerError::ShutdownTimeout { remaining: 2 };
        assert_eq!(err.to_string(), "2 connection(s) still open after shutdown timeout");
    }
}
