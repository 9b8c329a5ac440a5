//! # Gantry Core
//!
//! The request-dispatch core of the Gantry server framework.
//!
//! - [`Context`] - Per-request state and the handler chain runner
//! - [`Handler`] / [`Outcome`] - The unit of work and its result
//! - [`Response`] - Values a handler returns, rendered once after the chain
//! - [`ResponseWriter`] - The output sink the core writes to
//! - [`Values`] - Typed scratch store shared along one chain
//! - [`HttpError`] / [`ConfigError`] - Standard error types
//! - [`JsonCodec`] - The serialization collaborator

#![doc(html_root_url = "https://docs.rs/gantry-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod codec;
mod context;
mod error;
pub mod handler;
mod response;
mod values;
mod writer;

pub use codec::{CodecError, JsonCodec, JsonMap};
pub use context::{ChainState, Context, Request, RequestId};
pub use error::{
    BoxError, ConfigError, ErrorCategory, ErrorDetail, ErrorEnvelope, HttpError, HttpResult,
    MultiError, RenderError,
};
pub use gantry_router::Params;
pub use handler::{boxed, BoxHandler, Handler, Outcome};
pub use response::{Payload, Response, APPLICATION_JSON, TEXT_HTML, TEXT_PLAIN};
pub use values::{Key, Lookup, Values};
pub use writer::{BufferedWriter, ResponseWriter};
