//! Capturing response writer.

use std::io;

use gantry_core::ResponseWriter;
use http::{HeaderMap, StatusCode};

/// In-memory [`ResponseWriter`] for inspecting what a chain produced.
///
/// Unlike [`BufferedWriter`](gantry_core::BufferedWriter) it keeps count of
/// every [`set_status`](ResponseWriter::set_status) call, including the ones
/// ignored after the head was committed, so double rendering shows up.
///
/// ```
/// use gantry_core::{Context, Response};
/// use gantry_test::CapturingWriter;
///
/// let mut writer = CapturingWriter::new();
/// let request = http::Request::get("/").body(bytes::Bytes::new()).unwrap();
///
/// let mut ctx = Context::new(request, &mut writer);
/// ctx.run();
/// ctx.render();
/// drop(ctx);
///
/// assert_eq!(writer.committed_status(), Some(http::StatusCode::NOT_FOUND));
/// assert_eq!(writer.status_calls(), 1);
/// ```
#[derive(Debug, Default)]
pub struct CapturingWriter {
    headers: HeaderMap,
    status: Option<StatusCode>,
    status_calls: usize,
    body: Vec<u8>,
}

impl CapturingWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the committed status, if any.
    pub fn committed_status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Returns how many times `set_status` was called.
    pub fn status_calls(&self) -> usize {
        self.status_calls
    }

    /// Returns the captured body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the captured body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns the captured body as JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Consumes the writer into status, headers and body.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
        (self.status.unwrap_or(StatusCode::OK), self.headers, self.body)
    }
}

impl ResponseWriter for CapturingWriter {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status_calls += 1;
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn has_started(&self) -> bool {
        self.status.is_some()
    }

    fn bytes_written(&self) -> u64 {
        self.body.len() as u64
    }
}
