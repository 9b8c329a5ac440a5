//! Output sink abstraction.
//!
//! The chain runner only needs header access, a status, and a byte sink.
//! [`ResponseWriter`] is that capability set; the server implements it over a
//! streaming connection and [`BufferedWriter`] implements it in memory.

use std::io;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};

/// Destination of a response.
///
/// The first call to [`set_status`](ResponseWriter::set_status) or
/// [`write`](ResponseWriter::write) commits the response head. After that
/// further status changes are ignored and header changes are not sent.
pub trait ResponseWriter: Send {
    /// Returns the response headers.
    fn headers(&self) -> &HeaderMap;

    /// Returns the response headers for modification.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Sets the status code and commits the response head.
    ///
    /// Has no effect once output has started.
    fn set_status(&mut self, status: StatusCode);

    /// Returns the committed status, or `200 OK` if nothing was committed.
    fn status(&self) -> StatusCode;

    /// Writes body bytes, committing a `200 OK` head first if needed.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Returns true once the response head has been committed.
    fn has_started(&self) -> bool;

    /// Returns the number of body bytes accepted so far.
    fn bytes_written(&self) -> u64;

    /// Writes the whole buffer.
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf)? {
                0 => return Err(io::ErrorKind::WriteZero.into()),
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }
}

/// In-memory [`ResponseWriter`] that collects the response.
///
/// ```
/// use gantry_core::{BufferedWriter, ResponseWriter};
/// use http::StatusCode;
///
/// let mut w = BufferedWriter::new();
/// w.set_status(StatusCode::CREATED);
/// w.write_all(b"done").unwrap();
///
/// let response = w.into_response();
/// assert_eq!(response.status(), StatusCode::CREATED);
/// assert_eq!(response.body().as_ref(), b"done");
/// ```
#[derive(Debug, Default)]
pub struct BufferedWriter {
    headers: HeaderMap,
    status: Option<StatusCode>,
    body: BytesMut,
}

impl BufferedWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the body written so far.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Converts the collected output into an HTTP response.
    #[must_use]
    pub fn into_response(self) -> http::Response<Bytes> {
        let mut response = http::Response::new(self.body.freeze());
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseWriter for BufferedWriter {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn set_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.set_status(StatusCode::OK);
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
