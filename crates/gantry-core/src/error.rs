//! Error types for Gantry.
//!
//! - [`HttpError`]: errors a handler returns; rendered as a JSON envelope.
//! - [`ConfigError`]: registration misuse, returned to the caller of the
//!   registration method.
//! - [`RenderError`]: serialization or write failures while rendering.
//! - [`MultiError`]: accumulates several errors into one.

use std::fmt;

use gantry_router::InsertError;
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::CodecError;

/// Result type alias using [`HttpError`].
pub type HttpResult<T> = Result<T, HttpError>;

/// Boxed error used by [`MultiError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Categories of errors for classification and status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed request (bad body, bad parameter).
    BadRequest,
    /// Missing or invalid credentials.
    Unauthorized,
    /// Permission denied.
    Forbidden,
    /// Resource not found.
    NotFound,
    /// Method not supported on this path.
    MethodNotAllowed,
    /// Conflict (e.g., duplicate resource).
    Conflict,
    /// Internal server errors.
    Internal,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the machine-readable code used in error envelopes.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Error returned by handlers.
///
/// Every variant maps to a status code and renders as
/// `{"error":{"code":"...","message":"..."}}`.
///
/// # Example
///
/// ```
/// use gantry_core::{ErrorCategory, HttpError};
///
/// fn validate(name: &str) -> Result<(), HttpError> {
///     if name.is_empty() {
///         return Err(HttpError::bad_request("name cannot be empty"));
///     }
///     Ok(())
/// }
///
/// assert_eq!(validate("").unwrap_err().category(), ErrorCategory::BadRequest);
/// ```
#[derive(Error, Debug)]
pub enum HttpError {
    /// Malformed request.
    #[error("bad request: {message}")]
    BadRequest {
        /// Human-readable error message.
        message: String,
    },

    /// Authentication required.
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Human-readable error message.
        message: String,
    },

    /// Permission denied.
    #[error("forbidden: {message}")]
    Forbidden {
        /// Human-readable error message.
        message: String,
    },

    /// Resource not found.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// Method not supported.
    #[error("method not allowed: {message}")]
    MethodNotAllowed {
        /// Human-readable error message.
        message: String,
    },

    /// Conflict.
    #[error("conflict: {message}")]
    Conflict {
        /// Human-readable error message.
        message: String,
    },

    /// Internal server error.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (never exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl HttpError {
    /// Creates a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates an unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a method not allowed error.
    #[must_use]
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::MethodNotAllowed {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::BadRequest { .. } => ErrorCategory::BadRequest,
            Self::Unauthorized { .. } => ErrorCategory::Unauthorized,
            Self::Forbidden { .. } => ErrorCategory::Forbidden,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::MethodNotAllowed { .. } => ErrorCategory::MethodNotAllowed,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Returns the client-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message }
            | Self::Unauthorized { message }
            | Self::Forbidden { message }
            | Self::NotFound { message }
            | Self::MethodNotAllowed { message }
            | Self::Conflict { message }
            | Self::Internal { message, .. } => message,
        }
    }

    /// Converts this error to a serializable error envelope.
    ///
    /// The source of an internal error is never included.
    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.category().code(), self.message())
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
}

impl ErrorEnvelope {
    /// Creates an envelope from a code and message.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

/// Error detail within an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Registration misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The route table is sealed because the server has started.
    #[error("cannot {operation} {target}: server already started")]
    Sealed {
        /// What was attempted, e.g. `"add route"`.
        operation: &'static str,
        /// The route or group the attempt targeted.
        target: String,
    },

    /// The `(method, pattern)` pair is already registered.
    #[error("route {method} {pattern} is already registered")]
    DuplicateRoute {
        /// Conflicting method.
        method: Method,
        /// Full pattern including group prefixes.
        pattern: String,
    },

    /// The pattern is malformed.
    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// Full pattern including group prefixes.
        pattern: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl From<InsertError> for ConfigError {
    fn from(err: InsertError) -> Self {
        match err {
            InsertError::Conflict { method, pattern } => Self::DuplicateRoute { method, pattern },
            InsertError::InvalidPattern { pattern, reason } => {
                Self::InvalidPattern { pattern, reason }
            }
        }
    }
}

/// Failure while rendering a response onto the output sink.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The payload could not be serialized.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The sink rejected the write (usually a closed connection).
    #[error("failed to write response: {0}")]
    Io(#[from] std::io::Error),
}

/// Accumulates errors from independent operations.
///
/// # Example
///
/// ```
/// use gantry_core::MultiError;
///
/// let mut errs = MultiError::new();
/// errs.push(std::io::Error::other("disk full"));
/// errs.push("listener closed");
///
/// let err = errs.into_result().unwrap_err();
/// assert_eq!(
///     err.to_string(),
///     "multiple errors returned:\n\tdisk full\n\tlistener closed"
/// );
/// ```
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<BoxError>,
}

impl MultiError {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an error.
    pub fn push(&mut self, err: impl Into<BoxError>) {
        self.errors.push(err.into());
    }

    /// Returns the number of accumulated errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if no errors were pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates over the accumulated errors.
    pub fn iter(&self) -> impl Iterator<Item = &BoxError> {
        self.errors.iter()
    }

    /// Returns the display strings of the accumulated errors.
    #[must_use]
    pub fn clone_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Collapses the accumulator.
    ///
    /// No errors yields `Ok(())`, a single error is returned as is, and
    /// several errors are returned as the aggregate.
    pub fn into_result(mut self) -> Result<(), BoxError> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(Box::new(self)),
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("multiple errors returned:")?;
        for err in &self.errors {
            write!(f, "\n\t{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_request_error() {
        let error = HttpError::bad_request("invalid email");
        assert_eq!(error.category(), ErrorCategory::BadRequest);
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert!(error.to_string().contains("invalid email"));
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = HttpError::not_found("no such user").to_envelope();
        let json = serde_json::to_string(&envelope).unwrap();
        assert_eq!(
            json,
            r#"{"error":{"code":"NOT_FOUND","message":"no such user"}}"#
        );
    }

    #[test]
    fn test_internal_source_not_leaked() {
        let error = HttpError::internal_with_source(
            "could not load profile",
            std::io::Error::other("/var/secret/db.sqlite: permission denied"),
        );
        assert!(std::error::Error::source(&error).is_some());

        let json = serde_json::to_string(&error.to_envelope()).unwrap();
        assert!(json.contains("could not load profile"));
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_all_categories_have_error_status_codes() {
        let categories = [
            ErrorCategory::BadRequest,
            ErrorCategory::Unauthorized,
            ErrorCategory::Forbidden,
            ErrorCategory::NotFound,
            ErrorCategory::MethodNotAllowed,
            ErrorCategory::Conflict,
            ErrorCategory::Internal,
        ];

        for category in categories {
            let status = category.default_status_code();
            assert!(
                status.is_client_error() || status.is_server_error(),
                "Category {:?} should map to error status code, got {}",
                category,
                status
            );
        }
    }

    #[test]
    fn test_config_error_from_insert_error() {
        let err: ConfigError = InsertError::Conflict {
            method: Method::GET,
            pattern: "/ping".to_string(),
        }
        .into();
        assert_eq!(
            err,
            ConfigError::DuplicateRoute {
                method: Method::GET,
                pattern: "/ping".to_string()
            }
        );
    }

    #[test]
    fn test_multi_error_empty_is_ok() {
        assert!(MultiError::new().into_result().is_ok());
    }

    #[test]
    fn test_multi_error_single_is_unwrapped() {
        let mut errs = MultiError::new();
        errs.push("only one");
        let err = errs.into_result().unwrap_err();
        assert_eq!(err.to_string(), "only one");
        assert!(err.downcast_ref::<MultiError>().is_none());
    }

    #[test]
    fn test_multi_error_aggregate() {
        let mut errs = MultiError::new();
        errs.push("first");
        errs.push("second");
        assert_eq!(errs.len(), 2);

        let err = errs.into_result().unwrap_err();
        let multi = err.downcast_ref::<MultiError>().unwrap();
        assert_eq!(multi.clone_messages(), vec!["first", "second"]);
        assert_eq!(
            err.to_string(),
            "multiple errors returned:\n\tfirst\n\tsecond"
        );
    }
}
