//! Failure injection tests for the reverse proxy.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

mod common;

#[tokio::test]
async fn test_unreachable_backend_is_503_with_error_text() {
    let dead = common::closed_port().await;
    let proxy = common::start_proxy(common::localhost_config(&[(dead, "api")])).await;

    let res = common::client()
        .get(proxy.url("/"))
        .header("Host", "api.localhost")
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.headers()["server"], "Proxit");
    let page = res.text().await.unwrap();
    assert!(page.contains("503"));
    assert!(page.contains("client error"), "page was: {}", page);

    // The synthesized 503 counts as errored and, not being 500 or 404, as
    // successful too.
    let stats = proxy.stats.snapshot();
    assert_eq!(stats.errored, 1);
    assert_eq!(stats.successful, 1);
}

#[tokio::test]
async fn test_hidden_backend_errors() {
    let dead = common::closed_port().await;
    let mut config = common::localhost_config(&[(dead, "api")]);
    config.errors.expose_backend_errors = false;
    let proxy = common::start_proxy(config).await;

    let res = common::client()
        .get(proxy.url("/"))
        .header("Host", "api.localhost")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let page = res.text().await.unwrap();
    assert!(page.contains("Service Unavailable"));
    assert!(!page.contains("client error"));
}

#[tokio::test]
async fn test_no_retry_on_failure() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let backend = common::start_programmable_backend(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (502, "bad gateway".into())
        }
    })
    .await;
    let proxy = common::start_proxy(common::localhost_config(&[(backend.port(), "api")])).await;

    let res = common::client()
        .get(proxy.url("/"))
        .header("Host", "api.localhost")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.text().await.unwrap(), "bad gateway");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_success_counting_boundary() {
    let cases: [(u16, u64); 5] = [(200, 1), (403, 1), (503, 1), (500, 0), (404, 0)];

    for (status, expected_success) in cases {
        let backend = common::start_mock_backend(status, "body").await;
        let proxy =
            common::start_proxy(common::localhost_config(&[(backend.port(), "api")])).await;

        let res = common::client()
            .get(proxy.url("/"))
            .header("Host", "api.localhost")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), status);
        assert_eq!(res.headers()["server"], "Proxit");

        let stats = proxy.stats.snapshot();
        assert_eq!(stats.successful, expected_success, "status {}", status);
        assert_eq!(stats.errored, 0, "status {}", status);
    }
}

#[tokio::test]
async fn test_slow_backend_still_relayed() {
    let backend = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        (200, "slow".into())
    })
    .await;
    let proxy = common::start_proxy(common::localhost_config(&[(backend.port(), "api")])).await;

    let res = common::client()
        .get(proxy.url("/"))
        .header("Host", "api.localhost")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "slow");
}

#[tokio::test]
async fn test_request_timeout() {
    let backend = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        (200, "too late".into())
    })
    .await;
    let mut config = common::localhost_config(&[(backend.port(), "api")]);
    config.listener.timeout_secs = 1;
    let proxy = common::start_proxy(config).await;

    let res = common::client()
        .get(proxy.url("/"))
        .header("Host", "api.localhost")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(res.headers()["server"], "Proxit");
}

#[tokio::test]
async fn test_client_disconnect_stops_backend_stream() {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let backend = common::start_raw_backend(move |mut socket, _| {
        let done_tx = done_tx.clone();
        async move {
            let head = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\n\r\n";
            if socket.write_all(head).await.is_err() {
                return;
            }
            let mut chunk = b"400\r\n".to_vec();
            chunk.extend_from_slice(&[b'x'; 1024]);
            chunk.extend_from_slice(b"\r\n");

            let mut sent = 0usize;
            // Bounded so a proxy that never lets go still ends the test.
            while sent < 2000 {
                if socket.write_all(&chunk).await.is_err() {
                    let _ = done_tx.send(sent);
                    return;
                }
                sent += 1;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    })
    .await;
    let proxy = common::start_proxy(common::localhost_config(&[(backend.port(), "api")])).await;

    let mut stream = TcpStream::connect(proxy.addr).await.unwrap();
    stream
        .write_all(b"GET /stream HTTP/1.1\r\nHost: api.localhost\r\n\r\n")
        .await
        .unwrap();
    let head = common::read_head(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200"), "head was: {}", head);
    drop(stream);

    let sent = tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
        .await
        .expect("backend kept streaming after the client left")
        .unwrap();
    assert!(sent < 500, "backend wrote {} chunks", sent);
}

#[tokio::test]
async fn test_stalled_response_body_is_cut() {
    let backend = common::start_raw_backend(|mut socket, _| async move {
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial")
            .await;
        tokio::time::sleep(Duration::from_secs(10)).await;
    })
    .await;
    let mut config = common::localhost_config(&[(backend.port(), "api")]);
    config.listener.timeout_secs = 1;
    let proxy = common::start_proxy(config).await;

    let res = common::client()
        .get(proxy.url("/"))
        .header("Host", "api.localhost")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = tokio::time::timeout(Duration::from_secs(5), res.bytes())
        .await
        .expect("stalled body was not cut off");
    assert!(body.is_err());
}
