//! Handler trait and outcome type.
//!
//! A handler is any `Fn(&mut Context) -> impl Into<Outcome>`. Middleware and
//! terminal route handlers share the same signature; the only difference is
//! where they sit in the chain.

use std::io;
use std::sync::Arc;

use serde::Serialize;

use crate::context::Context;
use crate::error::HttpError;
use crate::response::Response;
use crate::writer::ResponseWriter;

/// What a handler decided.
#[derive(Debug)]
pub enum Outcome {
    /// Continue with the next handler in the chain.
    Proceed,
    /// Stop the chain and render this response.
    Respond(Response),
}

impl Outcome {
    /// Returns true for [`Outcome::Proceed`].
    #[must_use]
    pub const fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}

impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Self::Respond(response)
    }
}

impl From<Option<Response>> for Outcome {
    fn from(response: Option<Response>) -> Self {
        response.map_or(Self::Proceed, Self::Respond)
    }
}

impl From<()> for Outcome {
    fn from((): ()) -> Self {
        Self::Proceed
    }
}

impl<T: Into<Outcome>> From<Result<T, HttpError>> for Outcome {
    fn from(result: Result<T, HttpError>) -> Self {
        match result {
            Ok(v) => v.into(),
            Err(err) => Self::Respond(Response::from_error(&err)),
        }
    }
}

/// A unit of work in a handler chain.
///
/// Implemented for every `Fn(&mut Context<'_>) -> R` where `R: Into<Outcome>`,
/// so closures and plain functions work directly:
///
/// ```
/// use gantry_core::{Context, Handler, Response};
///
/// fn ping(_: &mut Context<'_>) -> Response {
///     Response::json(serde_json::json!({"ok": true}))
/// }
///
/// fn assert_handler<H: Handler>(_: H) {}
/// assert_handler(ping);
/// assert_handler(|ctx: &mut Context<'_>| ctx.set("seen", true));
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Runs the handler.
    fn call(&self, ctx: &mut Context<'_>) -> Outcome;
}

impl<F, R> Handler for F
where
    F: Fn(&mut Context<'_>) -> R + Send + Sync + 'static,
    R: Into<Outcome>,
{
    fn call(&self, ctx: &mut Context<'_>) -> Outcome {
        self(ctx).into()
    }
}

/// Shared, type-erased handler.
pub type BoxHandler = Arc<dyn Handler>;

/// Erases a handler's type.
pub fn boxed<H: Handler>(handler: H) -> BoxHandler {
    Arc::new(handler)
}

/// Adapts a closure returning `Result<T, HttpError>` into a JSON handler.
///
/// `Ok` renders as `200 OK` with `T` as the body, `Err` as the error envelope.
///
/// ```
/// use gantry_core::{handler, Context, HttpError};
///
/// let h = handler::json(|ctx: &mut Context<'_>| {
///     let id = ctx.param("id").ok_or_else(|| HttpError::bad_request("missing id"))?;
///     Ok(serde_json::json!({ "id": id }))
/// });
/// # let _ = h;
/// ```
pub fn json<F, T>(f: F) -> impl Handler
where
    F: Fn(&mut Context<'_>) -> Result<T, HttpError> + Send + Sync + 'static,
    T: Serialize + Send + 'static,
{
    move |ctx: &mut Context<'_>| -> Outcome {
        match f(ctx) {
            Ok(payload) => Response::json(payload).into(),
            Err(err) => Response::from_error(&err).into(),
        }
    }
}

/// Adapts a closure that writes straight to the output sink.
///
/// The chain proceeds afterwards; because output has started, nothing else
/// is rendered. A failed write is logged and otherwise ignored.
pub fn writer_fn<F>(f: F) -> impl Handler
where
    F: Fn(&mut dyn ResponseWriter) -> io::Result<()> + Send + Sync + 'static,
{
    move |ctx: &mut Context<'_>| {
        if let Err(err) = f(ctx.writer_mut()) {
            tracing::debug!(error = %err, path = %ctx.path(), "direct write failed");
        }
    }
}
