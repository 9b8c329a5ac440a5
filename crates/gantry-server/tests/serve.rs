//! Socket-level tests for the server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use gantry_core::{handler, Context, Response, ResponseWriter};
use gantry_server::{h2_client, RunningServer, Server, ServerConfig};
use gantry_telemetry::RequestInfo;
use http::{StatusCode, Version};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use parking_lot::Mutex;

type Http1Client = Client<HttpConnector, Full<Bytes>>;

fn http1_client() -> Http1Client {
    Client::builder(TokioExecutor::new()).build_http()
}

fn config() -> ServerConfig {
    ServerConfig::builder()
        .http_addr("127.0.0.1:0")
        .max_body_size(64)
        .shutdown_timeout(Duration::from_secs(5))
        .build()
}

fn routes(server: &Server) {
    let root = server.root();
    root.get("/ping", |_: &mut Context<'_>| {
        Response::json(serde_json::json!({ "ok": true }))
    })
    .unwrap();
    root.post("/echo", |ctx: &mut Context<'_>| {
        Response::raw(StatusCode::OK, http::HeaderMap::new(), ctx.body().clone())
    })
    .unwrap();
    root.get("/peer", |ctx: &mut Context<'_>| {
        Response::text(ctx.remote_addr().map(|a| a.ip().to_string()).unwrap_or_default())
    })
    .unwrap();
    root.get(
        "/stream",
        handler::writer_fn(|w: &mut dyn ResponseWriter| {
            w.set_status(StatusCode::CREATED);
            for i in 0..100 {
                w.write_all(format!("line {i}\n").as_bytes())?;
            }
            Ok(())
        }),
    )
    .unwrap();
}

async fn start(server: Server) -> (RunningServer, SocketAddr) {
    let running = server.start().await.unwrap();
    let addr = running.addrs()[0];
    (running, addr)
}

async fn send(
    client: &Http1Client,
    method: http::Method,
    uri: String,
    body: &'static [u8],
) -> (StatusCode, Version, Bytes) {
    let request = http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Full::new(Bytes::from_static(body)))
        .unwrap();
    let response = client.request(request).await.unwrap();
    let (status, version) = (response.status(), response.version());
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, version, body)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_json_route_over_http1() {
    let server = Server::new(config());
    routes(&server);
    let (running, addr) = start(server).await;

    let (status, version, body) =
        send(&http1_client(), http::Method::GET, format!("http://{addr}/ping"), b"").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(version, Version::HTTP_11);
    assert_eq!(body.as_ref(), br#"{"ok":true}"#);

    running.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_h2c_client() {
    let server = Server::new(config());
    routes(&server);
    let (running, addr) = start(server).await;

    let (status, version, body) =
        send(&h2_client(), http::Method::GET, format!("http://{addr}/ping"), b"").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(version, Version::HTTP_2);
    assert_eq!(body.as_ref(), br#"{"ok":true}"#);

    running.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_body_limits() {
    let server = Server::new(config());
    routes(&server);
    let (running, addr) = start(server).await;
    let client = http1_client();

    let (status, _, body) =
        send(&client, http::Method::POST, format!("http://{addr}/echo"), b"hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_ref(), b"hello");

    let big: &'static [u8] = &[b'x'; 65];
    let (status, _, body) = send(&client, http::Method::POST, format!("http://{addr}/echo"), big).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let envelope: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["error"]["code"], "PAYLOAD_TOO_LARGE");

    running.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_streamed_body_and_peer_address() {
    let server = Server::new(config());
    routes(&server);
    let (running, addr) = start(server).await;
    let client = http1_client();

    let (status, _, body) = send(&client, http::Method::GET, format!("http://{addr}/stream"), b"").await;
    assert_eq!(status, StatusCode::CREATED);
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert_eq!(text.lines().count(), 100);
    assert!(text.ends_with("line 99\n"));

    let (_, _, body) = send(&client, http::Method::GET, format!("http://{addr}/peer"), b"").await;
    assert_eq!(body.as_ref(), b"127.0.0.1");

    running.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_logger_records_each_request_once() {
    let records: Arc<Mutex<Vec<(String, StatusCode)>>> = Arc::default();
    let sink = Arc::clone(&records);

    let server = Server::new(config()).with_logger(move |info: &RequestInfo| {
        sink.lock().push((info.path.clone(), info.status));
    });
    routes(&server);
    let (running, addr) = start(server).await;
    let client = http1_client();

    send(&client, http::Method::GET, format!("http://{addr}/ping"), b"").await;
    send(&client, http::Method::GET, format!("http://{addr}/missing"), b"").await;

    // The record is written after the response body, so allow it to land.
    for _ in 0..50 {
        if records.lock().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut seen = records.lock().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("/missing".to_string(), StatusCode::NOT_FOUND),
            ("/ping".to_string(), StatusCode::OK),
        ]
    );

    running.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_http2_disabled_rejects_prior_knowledge() {
    let config = ServerConfig::builder()
        .http_addr("127.0.0.1:0")
        .http2_enabled(false)
        .build();
    let server = Server::new(config);
    routes(&server);
    let (running, addr) = start(server).await;

    let request = http::Request::get(format!("http://{addr}/ping"))
        .body(Full::new(Bytes::new()))
        .unwrap();
    assert!(h2_client().request(request).await.is_err());

    let (status, _, _) =
        send(&http1_client(), http::Method::GET, format!("http://{addr}/ping"), b"").await;
    assert_eq!(status, StatusCode::OK);

    running.shutdown().await.unwrap();
}
