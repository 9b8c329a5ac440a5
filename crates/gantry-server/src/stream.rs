//! Streaming response plumbing between a blocking chain and hyper.
//!
//! The chain writes to a [`StreamingWriter`] on a blocking thread. The head
//! goes out through a oneshot when output starts; body chunks go through a
//! bounded channel that hyper drains as a [`ChannelBody`]. Once the
//! connection goes away the receiving half is dropped and writes fail with
//! `BrokenPipe`.

use std::convert::Infallible;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use gantry_core::ResponseWriter;
use http::{HeaderMap, StatusCode};
use hyper::body::{Body, Frame};
use tokio::sync::{mpsc, oneshot};

/// Body chunks buffered before a writer blocks.
const BODY_CHANNEL_CAPACITY: usize = 16;

/// Status and headers, sent once.
pub(crate) type ResponseHead = (StatusCode, HeaderMap);

/// Creates a connected writer, head receiver and body.
pub(crate) fn response_channel() -> (
    StreamingWriter,
    oneshot::Receiver<ResponseHead>,
    ChannelBody,
) {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);

    let writer = StreamingWriter {
        headers: HeaderMap::new(),
        status: None,
        head_tx: Some(head_tx),
        body_tx,
        bytes_written: 0,
        disconnected: false,
    };
    (writer, head_rx, ChannelBody { rx: body_rx })
}

/// [`ResponseWriter`] that forwards to a hyper response.
///
/// Must only be written from outside the async runtime; writes block when
/// the body channel is full.
#[derive(Debug)]
pub(crate) struct StreamingWriter {
    headers: HeaderMap,
    status: Option<StatusCode>,
    head_tx: Option<oneshot::Sender<ResponseHead>>,
    body_tx: mpsc::Sender<Bytes>,
    bytes_written: u64,
    disconnected: bool,
}

impl ResponseWriter for StreamingWriter {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn set_status(&mut self, status: StatusCode) {
        if self.status.is_some() {
            return;
        }
        self.status = Some(status);

        if let Some(tx) = self.head_tx.take() {
            if tx.send((status, self.headers.clone())).is_err() {
                self.disconnected = true;
            }
        }
    }

    fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.set_status(StatusCode::OK);
        }
        if self.disconnected {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        if buf.is_empty() {
            return Ok(0);
        }

        match self.body_tx.blocking_send(Bytes::copy_from_slice(buf)) {
            Ok(()) => {
                self.bytes_written += buf.len() as u64;
                Ok(buf.len())
            }
            Err(_) => {
                self.disconnected = true;
                Err(io::ErrorKind::BrokenPipe.into())
            }
        }
    }

    fn has_started(&self) -> bool {
        self.status.is_some()
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// Response body fed by a [`StreamingWriter`]. Ends when the writer drops.
#[derive(Debug)]
pub(crate) struct ChannelBody {
    rx: mpsc::Receiver<Bytes>,
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.rx
            .poll_recv(cx)
            .map(|chunk| chunk.map(|bytes| Ok(Frame::data(bytes))))
    }
}
