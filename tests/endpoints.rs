//! End-to-end tests of the three endpoints over real sockets.

use std::time::Duration;

use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

#[tokio::test]
async fn download_returns_exact_size() {
    let server = common::start_server(|_| {}).await;
    let client = common::client();

    for size in [1u64, 32 * 1024, 32 * 1024 + 1, 1_000_000] {
        let res = client
            .get(server.url(&format!("/download?size={size}")))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.content_length(), Some(size));
        assert_eq!(
            res.headers()["content-type"],
            "application/octet-stream"
        );
        let body = res.bytes().await.unwrap();
        assert_eq!(body.len() as u64, size);
    }

    server.shutdown.trigger();
}

#[tokio::test]
async fn download_without_size_is_two_mebibytes() {
    let server = common::start_server(|_| {}).await;
    let res = common::client().get(server.url("/download")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.bytes().await.unwrap().len(), 2 * 1024 * 1024);

    server.shutdown.trigger();
}

#[tokio::test]
async fn download_rejects_invalid_sizes() {
    let server = common::start_server(|_| {}).await;
    let client = common::client();

    for size in ["abc", "0", "-1", "104857601", "1e6"] {
        let res = client
            .get(server.url(&format!("/download?size={size}")))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "size={size}");
        let body = res.text().await.unwrap();
        assert!(
            body == "invalid size parameter\n"
                || body == "size must be between 1 and 104857600 bytes\n",
            "unexpected body {body:?}"
        );
    }

    server.shutdown.trigger();
}

#[tokio::test]
async fn concurrent_downloads_do_not_interfere() {
    let server = common::start_server(|c| c.limits.buffer_size = 4096).await;
    let client = common::client();

    let mut tasks = Vec::new();
    for i in 1..=16u64 {
        let size = i * 10_007;
        let client = client.clone();
        let url = server.url(&format!("/download?size={size}"));
        tasks.push(tokio::spawn(async move {
            let res = client.get(url).send().await.unwrap();
            let declared = res.content_length();
            let received = res.bytes().await.unwrap().len() as u64;
            (size, declared, received)
        }));
    }

    for task in tasks {
        let (size, declared, received) = task.await.unwrap();
        assert_eq!(declared, Some(size));
        assert_eq!(received, size);
    }

    server.shutdown.trigger();
}

#[tokio::test]
async fn client_disconnect_mid_download_is_harmless() {
    let server = common::start_server(|_| {}).await;
    let client = common::client();

    let mut res = client
        .get(server.url("/download?size=104857600"))
        .send()
        .await
        .unwrap();
    let mut received = 0;
    while received < 256 * 1024 {
        received += res.chunk().await.unwrap().unwrap().len();
    }
    drop(res);

    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = client.get(server.url("/download?size=1000")).send().await.unwrap();
    assert_eq!(res.bytes().await.unwrap().len(), 1000);

    server.shutdown.trigger();
}

#[tokio::test]
async fn upload_within_limit_succeeds() {
    let server = common::start_server(|_| {}).await;
    let res = common::client()
        .post(server.url("/upload"))
        .body(vec![42u8; 3 * 1024 * 1024])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "ok");

    server.shutdown.trigger();
}

#[tokio::test]
async fn upload_over_limit_is_rejected() {
    let server = common::start_server(|c| c.limits.max_upload_bytes = 1024).await;
    let res = common::client()
        .post(server.url("/upload"))
        .body(vec![0u8; 4096])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        res.text().await.unwrap(),
        "Request too large or processing error\n"
    );

    server.shutdown.trigger();
}

#[tokio::test]
async fn health_under_load_and_any_method() {
    let server = common::start_server(|_| {}).await;
    let client = common::client();

    // Keep a large download streaming while probing.
    let mut busy = client
        .get(server.url("/download?size=104857600"))
        .send()
        .await
        .unwrap();
    assert!(busy.chunk().await.unwrap().is_some());

    for method in [
        reqwest::Method::GET,
        reqwest::Method::POST,
        reqwest::Method::PUT,
        reqwest::Method::DELETE,
    ] {
        let res = client
            .request(method.clone(), server.url("/health?verbose=true"))
            .header("x-forwarded-for", "not-an-ip")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{method}");
        assert!(res.headers().contains_key("x-request-id"));
        assert_eq!(res.text().await.unwrap(), "healthy");
    }

    drop(busy);
    server.shutdown.trigger();
}

#[tokio::test]
async fn stalled_reader_releases_connection_slot() {
    let server = common::start_server(|c| {
        c.listener.max_connections = 1;
        c.timeouts.write_secs = 1;
    })
    .await;

    // Take the only slot and never read the response.
    let mut stalled = TcpStream::connect(server.addr).await.unwrap();
    stalled
        .write_all(b"GET /download?size=104857600 HTTP/1.1\r\nHost: test\r\n\r\n")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;

    let res = tokio::time::timeout(
        Duration::from_secs(5),
        common::client().get(server.url("/health")).send(),
    )
    .await
    .expect("connection slot still held by stalled reader")
    .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    drop(stalled);
    server.shutdown.trigger();
}

#[tokio::test]
async fn stalled_upload_body_is_rejected() {
    let server = common::start_server(|c| c.timeouts.read_secs = 1).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"POST /upload HTTP/1.1\r\nHost: test\r\nContent-Length: 1000\r\n\r\n0123456789")
        .await
        .unwrap();

    let mut response = Vec::new();
    let mut buf = [0u8; 1024];
    tokio::time::timeout(Duration::from_secs(5), async {
        while !response.windows(2).any(|w| w == b"\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before a response");
            response.extend_from_slice(&buf[..n]);
        }
    })
    .await
    .expect("no response to stalled upload");

    assert!(
        response.starts_with(b"HTTP/1.1 413"),
        "unexpected response {:?}",
        String::from_utf8_lossy(&response)
    );

    server.shutdown.trigger();
}
