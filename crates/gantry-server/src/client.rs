//! HTTP/2 client factory.

use bytes::Bytes;
use http_body_util::Full;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

/// Client speaking HTTP/2 with prior knowledge over plain TCP.
pub type H2Client = Client<HttpConnector, Full<Bytes>>;

/// Creates a client for h2c servers, such as a [`Server`](crate::Server)
/// with HTTP/2 enabled.
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// use bytes::Bytes;
/// use http_body_util::{BodyExt, Full};
///
/// let client = gantry_server::h2_client();
/// let request = http::Request::get("http://127.0.0.1:8080/ping").body(Full::new(Bytes::new()))?;
/// let response = client.request(request).await?;
/// assert_eq!(response.version(), http::Version::HTTP_2);
/// let body = response.into_body().collect().await?.to_bytes();
/// # let _ = body;
/// # Ok(())
/// # }
/// ```
pub fn h2_client() -> H2Client {
    Client::builder(TokioExecutor::new())
        .http2_only(true)
        .build_http()
}
