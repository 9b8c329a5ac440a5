//! Test client for in-memory dispatch.

use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;
use gantry_server::{Dispatcher, Group};
use http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;

use crate::capture::CapturingWriter;
use crate::error::TestError;
use crate::response::TestResponse;

/// Dispatches requests against a route tree without a network.
///
/// Requests go through the same resolution, middleware and rendering as on
/// a real connection; only the transport is skipped.
#[must_use]
pub struct TestClient {
    dispatcher: Dispatcher,
    default_headers: HeaderMap,
}

impl TestClient {
    /// Creates a client over the tree rooted at `root`.
    pub fn new(root: &Group) -> Self {
        Self::from_dispatcher(Dispatcher::new(root))
    }

    /// Creates a client over an existing dispatcher, keeping its logger.
    pub fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            default_headers: HeaderMap::new(),
        }
    }

    /// Adds a header sent with every request.
    ///
    /// Invalid names or values are ignored.
    pub fn with_default_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            self.default_headers.insert(name, value);
        }
        self
    }

    /// Starts a GET request.
    pub fn get(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::GET, path)
    }

    /// Starts a POST request.
    pub fn post(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::POST, path)
    }

    /// Starts a PUT request.
    pub fn put(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::PUT, path)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::DELETE, path)
    }

    /// Starts an OPTIONS request.
    pub fn options(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::OPTIONS, path)
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, path: &str) -> TestRequest<'_> {
        TestRequest {
            client: self,
            method,
            uri: path.to_string(),
            query: Vec::new(),
            headers: self.default_headers.clone(),
            body: Bytes::new(),
            remote_addr: None,
            error: None,
        }
    }
}

impl fmt::Debug for TestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestClient")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// A request being built against a [`TestClient`].
///
/// Builder errors are held until [`send`](TestRequest::send).
#[must_use]
pub struct TestRequest<'a> {
    client: &'a TestClient,
    method: Method,
    uri: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    error: Option<TestError>,
}

impl TestRequest<'_> {
    /// Sets a header, replacing earlier values.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => self.fail(TestError::InvalidHeader(format!("{name}: {value}"))),
        }
        self
    }

    /// Appends a percent-encoded query parameter.
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body and content type.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.body = Bytes::from(bytes);
                self.headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
            Err(err) => self.fail(TestError::Json(err)),
        }
        self
    }

    /// Pretends the request came from `addr`.
    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Dispatches the request and captures the response.
    pub fn send(self) -> Result<TestResponse, TestError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut uri = self.uri;
        if !self.query.is_empty() {
            let encoded: Vec<String> = self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            uri.push(if uri.contains('?') { '&' } else { '?' });
            uri.push_str(&encoded.join("&"));
        }

        let mut builder = http::Request::builder().method(self.method).uri(&uri);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers);
        }
        let mut request = builder
            .body(self.body)
            .map_err(|e| TestError::RequestBuild(format!("{uri}: {e}")))?;
        if let Some(addr) = self.remote_addr {
            request.extensions_mut().insert(addr);
        }

        let mut writer = CapturingWriter::new();
        let report = self.client.dispatcher.dispatch(request, &mut writer);
        Ok(TestResponse::new(writer, report))
    }

    fn fail(&mut self, err: TestError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

impl fmt::Debug for TestRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}
