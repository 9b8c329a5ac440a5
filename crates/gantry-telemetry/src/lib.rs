//! Logging and request telemetry for Gantry.
//!
//! - **Logging**: `tracing-subscriber` setup with JSON or pretty output
//! - **Request records**: [`RequestInfo`] and the [`RequestLogger`] observer
//!   the dispatcher calls once per completed request
//! - **Metrics**: request counters and a duration histogram via `metrics`
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `gantry_requests_total` | Counter | `method`, `status` |
//! | `gantry_request_duration_seconds` | Histogram | `method` |
//! | `gantry_handler_faults_total` | Counter | `method` |

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;
mod request;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig};
pub use request::{RequestInfo, RequestLogger, TracingLogger};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
