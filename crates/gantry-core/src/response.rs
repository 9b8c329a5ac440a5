//! Handler responses.
//!
//! A [`Response`] is a value a handler returns; nothing touches the output
//! sink until the [`Context`](crate::Context) renders it after the chain ends.

use std::fmt;

use bytes::Bytes;
use http::header::{HeaderValue, ALLOW, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;

use crate::codec::{CodecError, JsonCodec};
use crate::error::{HttpError, RenderError};
use crate::writer::ResponseWriter;

/// Content type for JSON bodies.
pub const APPLICATION_JSON: &str = "application/json; charset=utf-8";

/// Content type for plain text bodies.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Content type for HTML bodies.
pub const TEXT_HTML: &str = "text/html; charset=utf-8";

const NOT_FOUND_BODY: &[u8] = br#"{"error":{"code":"NOT_FOUND","message":"not found"}}"#;
const METHOD_NOT_ALLOWED_BODY: &[u8] =
    br#"{"error":{"code":"METHOD_NOT_ALLOWED","message":"method not allowed"}}"#;
const INTERNAL_ERROR_BODY: &[u8] =
    br#"{"error":{"code":"INTERNAL_ERROR","message":"internal server error"}}"#;

/// A serializable payload whose concrete type has been erased.
pub trait Payload: Send {
    /// Encodes the payload as JSON.
    fn encode(&self) -> Result<Vec<u8>, CodecError>;
}

impl<T: Serialize + Send> Payload for T {
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        JsonCodec::encode(self)
    }
}

/// A response produced by a handler.
///
/// # Example
///
/// ```
/// use gantry_core::{BufferedWriter, Response};
/// use http::StatusCode;
///
/// let mut sink = BufferedWriter::new();
/// Response::json(serde_json::json!({"ok": true}))
///     .render(&mut sink)
///     .unwrap();
///
/// let out = sink.into_response();
/// assert_eq!(out.status(), StatusCode::OK);
/// assert_eq!(out.body().as_ref(), br#"{"ok":true}"#);
/// ```
pub enum Response {
    /// Status plus a payload serialized at render time.
    Json {
        /// Response status.
        status: StatusCode,
        /// Body, encoded with [`JsonCodec`].
        payload: Box<dyn Payload>,
    },

    /// Redirect to another location.
    Redirect {
        /// A 3xx status.
        status: StatusCode,
        /// Value of the `Location` header.
        location: String,
    },

    /// Pre-rendered response.
    Raw {
        /// Response status.
        status: StatusCode,
        /// Headers merged into the sink before the head is committed.
        headers: HeaderMap,
        /// Body bytes.
        body: Bytes,
    },
}

impl Response {
    /// Creates a `200 OK` JSON response.
    pub fn json<T: Serialize + Send + 'static>(payload: T) -> Self {
        Self::json_with_status(StatusCode::OK, payload)
    }

    /// Creates a JSON response with the given status.
    pub fn json_with_status<T: Serialize + Send + 'static>(status: StatusCode, payload: T) -> Self {
        Self::Json {
            status,
            payload: Box::new(payload),
        }
    }

    /// Creates a `302 Found` redirect.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::redirect_with_status(StatusCode::FOUND, location)
    }

    /// Creates a `301 Moved Permanently` redirect.
    pub fn redirect_permanent(location: impl Into<String>) -> Self {
        Self::redirect_with_status(StatusCode::MOVED_PERMANENTLY, location)
    }

    /// Creates a `303 See Other` redirect.
    pub fn see_other(location: impl Into<String>) -> Self {
        Self::redirect_with_status(StatusCode::SEE_OTHER, location)
    }

    fn redirect_with_status(status: StatusCode, location: impl Into<String>) -> Self {
        Self::Redirect {
            status,
            location: location.into(),
        }
    }

    /// Creates a pre-rendered response.
    pub fn raw(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self::Raw {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Creates a `200 OK` plain text response.
    pub fn text(body: impl Into<Bytes>) -> Self {
        Self::with_content_type(StatusCode::OK, TEXT_PLAIN, body.into())
    }

    /// Creates a `200 OK` HTML response.
    pub fn html(body: impl Into<Bytes>) -> Self {
        Self::with_content_type(StatusCode::OK, TEXT_HTML, body.into())
    }

    /// Creates an empty `204 No Content` response.
    pub fn no_content() -> Self {
        Self::raw(StatusCode::NO_CONTENT, HeaderMap::new(), Bytes::new())
    }

    /// Creates an error envelope response for `err`.
    pub fn from_error(err: &HttpError) -> Self {
        Self::json_with_status(err.status_code(), err.to_envelope())
    }

    /// The default response when nothing in the chain answered.
    pub fn not_found() -> Self {
        Self::with_content_type(
            StatusCode::NOT_FOUND,
            APPLICATION_JSON,
            Bytes::from_static(NOT_FOUND_BODY),
        )
    }

    /// The default response when the path exists but the method does not.
    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let mut response = Self::with_content_type(
            StatusCode::METHOD_NOT_ALLOWED,
            APPLICATION_JSON,
            Bytes::from_static(METHOD_NOT_ALLOWED_BODY),
        );
        let allow = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let (Self::Raw { headers, .. }, Ok(value)) =
            (&mut response, HeaderValue::from_str(&allow))
        {
            headers.insert(ALLOW, value);
        }
        response
    }

    /// The generic internal error response.
    ///
    /// Carries no detail about the failure.
    pub fn internal_error() -> Self {
        Self::with_content_type(
            StatusCode::INTERNAL_SERVER_ERROR,
            APPLICATION_JSON,
            Bytes::from_static(INTERNAL_ERROR_BODY),
        )
    }

    fn with_content_type(status: StatusCode, content_type: &'static str, body: Bytes) -> Self {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self::Raw {
            status,
            headers,
            body,
        }
    }

    /// Returns the status this response renders with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Json { status, .. } | Self::Redirect { status, .. } | Self::Raw { status, .. } => {
                *status
            }
        }
    }

    /// Writes the response onto `writer`.
    ///
    /// The payload is encoded before anything reaches the sink, so a
    /// [`RenderError::Codec`] leaves the sink untouched.
    pub fn render(self, writer: &mut dyn ResponseWriter) -> Result<(), RenderError> {
        match self {
            Self::Json { status, payload } => {
                let body = payload.encode()?;
                let headers = writer.headers_mut();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
                headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
                writer.set_status(status);
                writer.write_all(&body)?;
            }
            Self::Redirect { status, location } => {
                let location = HeaderValue::try_from(location).map_err(|e| {
                    RenderError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
                })?;
                writer.headers_mut().insert(LOCATION, location);
                writer.set_status(status);
            }
            Self::Raw {
                status,
                headers,
                body,
            } => {
                let sink = writer.headers_mut();
                let mut current = None;
                for (name, value) in headers {
                    if let Some(name) = name {
                        sink.remove(&name);
                        current = Some(name);
                    }
                    if let Some(name) = &current {
                        sink.append(name, value);
                    }
                }
                if !body.is_empty() {
                    sink.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
                }
                writer.set_status(status);
                if !body.is_empty() {
                    writer.write_all(&body)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json { status, .. } => f.debug_struct("Json").field("status", status).finish(),
            Self::Redirect { status, location } => f
                .debug_struct("Redirect")
                .field("status", status)
                .field("location", location)
                .finish(),
            Self::Raw {
                status,
                headers,
                body,
            } => f
                .debug_struct("Raw")
                .field("status", status)
                .field("headers", headers)
                .field("body_len", &body.len())
                .finish(),
        }
    }
}

impl From<HttpError> for Response {
    fn from(err: HttpError) -> Self {
        Self::from_error(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::BufferedWriter;
    use std::collections::HashMap;

    fn rendered(response: Response) -> http::Response<Bytes> {
        let mut sink = BufferedWriter::new();
        response.render(&mut sink).unwrap();
        sink.into_response()
    }

    #[test]
    fn test_json_response() {
        let out = rendered(Response::json_with_status(
            StatusCode::CREATED,
            serde_json::json!({"id": 7}),
        ));
        assert_eq!(out.status(), StatusCode::CREATED);
        assert_eq!(out.headers()[CONTENT_TYPE], APPLICATION_JSON);
        assert_eq!(out.headers()[CONTENT_LENGTH], "8");
        assert_eq!(out.body().as_ref(), br#"{"id":7}"#);
    }

    #[test]
    fn test_redirect_variants() {
        let out = rendered(Response::redirect("/login"));
        assert_eq!(out.status(), StatusCode::FOUND);
        assert_eq!(out.headers()[LOCATION], "/login");

        assert_eq!(
            Response::redirect_permanent("/x").status(),
            StatusCode::MOVED_PERMANENTLY
        );
        assert_eq!(Response::see_other("/x").status(), StatusCode::SEE_OTHER);
    }

    #[test]
    fn test_not_found_body() {
        let out = rendered(Response::not_found());
        assert_eq!(out.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_slice(out.body()).unwrap();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[test]
    fn test_method_not_allowed_sets_allow() {
        let out = rendered(Response::method_not_allowed(&[Method::GET, Method::POST]));
        assert_eq!(out.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(out.headers()[ALLOW], "GET, POST");
    }

    #[test]
    fn test_internal_error_is_generic() {
        let out = rendered(Response::internal_error());
        assert_eq!(out.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(out.body().as_ref(), INTERNAL_ERROR_BODY);
    }

    #[test]
    fn test_from_error() {
        let out = rendered(HttpError::conflict("name taken").into());
        assert_eq!(out.status(), StatusCode::CONFLICT);
        assert_eq!(
            out.body().as_ref(),
            br#"{"error":{"code":"CONFLICT","message":"name taken"}}"#
        );
    }

    #[test]
    fn test_codec_failure_leaves_sink_untouched() {
        let mut bad = HashMap::new();
        bad.insert(vec![1u8], 1);

        let mut sink = BufferedWriter::new();
        let err = Response::json(bad).render(&mut sink).unwrap_err();
        assert!(matches!(err, RenderError::Codec(_)));
        assert!(!sink.has_started());
    }

    #[test]
    fn test_no_content_has_no_body() {
        let out = rendered(Response::no_content());
        assert_eq!(out.status(), StatusCode::NO_CONTENT);
        assert!(out.body().is_empty());
        assert!(out.headers().get(CONTENT_LENGTH).is_none());
    }
}
