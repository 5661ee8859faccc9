use std::io::{ErrorKind, Read};
use std::net::SocketAddr;
use std::time::Duration;

use flate2::read::GzDecoder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use rspond::{
    Body, Dispatcher, HandlerError, Server, ServerConfig, StatusCode, handler_fn,
};

async fn start(dispatcher: Dispatcher) -> SocketAddr {
    start_with(ServerConfig::default().addr("127.0.0.1:0"), dispatcher).await
}

async fn start_with(config: ServerConfig, dispatcher: Dispatcher) -> SocketAddr {
    let server = Server::with_config(config).await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.run(dispatcher));
    addr
}

/// Sends `raw` and reads until the server closes the connection.
async fn exchange(addr: SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    let mut out = Vec::new();
    match stream.read_to_end(&mut out).await {
        Ok(_) => {}
        // Unread request bytes make the server's close a reset.
        Err(e) if e.kind() == ErrorKind::ConnectionReset => {}
        Err(e) => panic!("read failed: {e}"),
    }
    out
}

fn split(response: &[u8]) -> (String, Vec<u8>) {
    let at = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has a header terminator");
    (
        String::from_utf8(response[..at].to_vec()).unwrap(),
        response[at + 4..].to_vec(),
    )
}

fn status_handler() -> Dispatcher {
    Dispatcher::with_handler(handler_fn(|ctx| {
        Box::pin(async move {
            ctx.response_mut().set_status(StatusCode::Ok);
            ctx.response_mut()
                .set_body(Body::new(&br#"{"ok":true}"#[..], "application/json"));
            ctx.mark_handled();
            Ok(())
        })
    }))
}

#[tokio::test]
async fn status_request_gets_exact_response() {
    let addr = start(status_handler()).await;
    let response = exchange(addr, b"GET /status HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

    assert_eq!(
        response,
        b"HTTP/1.1 200 OK\r\n\
          Access-Control-Allow-Origin:*\r\n\
          Connection:close\r\n\
          Content-Type:application/json\r\n\
          Content-Length:11\r\n\
          \r\n\
          {\"ok\":true}"
            .to_vec()
    );
}

#[tokio::test]
async fn gzip_accepted_compresses_body() {
    let addr = start(status_handler()).await;
    let response = exchange(
        addr,
        b"GET /status HTTP/1.1\r\nAccept-Encoding: gzip, deflate\r\n\r\n",
    )
    .await;
    let (head, body) = split(&response);

    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("Connection:close\r\nContent-Encoding:gzip\r\n"));
    assert!(head.contains(&format!("Content-Length:{}", body.len())));

    let mut decoded = Vec::new();
    GzDecoder::new(body.as_slice())
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, br#"{"ok":true}"#);
}

#[tokio::test]
async fn without_gzip_body_is_untouched() {
    let addr = start(status_handler()).await;
    let response = exchange(
        addr,
        b"GET /status HTTP/1.1\r\nAccept-Encoding: br, deflate\r\n\r\n",
    )
    .await;
    let (head, body) = split(&response);

    assert!(!head.contains("Content-Encoding"));
    assert_eq!(body, br#"{"ok":true}"#);
}

#[tokio::test]
async fn no_handler_is_not_implemented() {
    let addr = start(Dispatcher::new()).await;
    let response = exchange(addr, b"GET /status HTTP/1.1\r\n\r\n").await;
    let (head, body) = split(&response);

    assert!(head.starts_with("HTTP/1.1 501 Not Implemented\r\n"));
    assert!(head.ends_with("Content-Length:0"));
    assert!(body.is_empty());
}

#[tokio::test]
async fn unhandled_is_bad_request_with_handler_body() {
    let dispatcher = Dispatcher::with_handler(handler_fn(|ctx| {
        Box::pin(async move {
            ctx.response_mut().set_status(StatusCode::Ok);
            ctx.response_mut().add_header("X-Relay", "3");
            ctx.response_mut().set_body(Body::text("half done"));
            Ok(())
        })
    }));
    let addr = start(dispatcher).await;
    let response = exchange(addr, b"GET /status HTTP/1.1\r\n\r\n").await;
    let (head, body) = split(&response);

    assert!(head.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(head.ends_with("Content-Length:9\r\nX-Relay:3"));
    assert_eq!(body, b"half done");
}

#[tokio::test]
async fn handler_error_is_json_report() {
    let dispatcher = Dispatcher::with_handler(handler_fn(|_ctx| {
        Box::pin(async move { Err(HandlerError::new("NullPointer", "x")) })
    }));
    let addr = start(dispatcher).await;
    let response = exchange(addr, b"POST /relay HTTP/1.1\r\n\r\n{}").await;
    let (head, body) = split(&response);

    assert!(head.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    assert!(head.contains("Content-Type:application/json\r\n"));
    assert!(head.contains(&format!("Content-Length:{}", body.len())));

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["type"], "NullPointer");
    assert_eq!(json["message"], "x");
    assert_eq!(json["source"], "handler_fn");
}

#[tokio::test]
async fn binary_noise_gets_no_response() {
    let addr = start(status_handler()).await;
    let response = exchange(addr, &[0x16, 0x03, 0x01, 0x02, 0x00, 0xff, 0xfe, 0x00]).await;
    assert!(response.is_empty());
}

#[tokio::test]
async fn silent_peer_gets_no_response() {
    let addr = start(status_handler()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn head_larger_than_read_buffer_is_dropped() {
    let config = ServerConfig::default()
        .addr("127.0.0.1:0")
        .read_buffer_size(32);
    let addr = start_with(config, status_handler()).await;

    let raw = format!(
        "GET /status HTTP/1.1\r\nX-Padding: {}\r\n\r\n",
        "a".repeat(100)
    );
    let response = exchange(addr, raw.as_bytes()).await;
    assert!(response.is_empty());
}

#[tokio::test]
async fn concurrent_connections_do_not_cross_talk() {
    let dispatcher = Dispatcher::with_handler(handler_fn(|ctx| {
        Box::pin(async move {
            let path = ctx.request().path().to_owned();
            ctx.response_mut().set_status(StatusCode::Ok);
            ctx.response_mut().set_body(Body::text(path));
            ctx.mark_handled();
            Ok(())
        })
    }));
    let addr = start(dispatcher).await;

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            tokio::spawn(async move {
                let raw = format!("GET /relay/{i} HTTP/1.1\r\n\r\n");
                (i, exchange(addr, raw.as_bytes()).await)
            })
        })
        .collect();

    for task in tasks {
        let (i, response) = task.await.unwrap();
        let (head, body) = split(&response);
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body, format!("/relay/{i}").into_bytes());
    }
}

#[tokio::test]
async fn latin1_header_value_still_answered() {
    let addr = start(status_handler()).await;
    let response = exchange(addr, b"GET /status HTTP/1.1\r\nUser-Agent: caf\xe9\r\n\r\n").await;
    assert!(split(&response).0.starts_with("HTTP/1.1 200 OK\r\n"));
}

fn slow_or_panicking() -> Dispatcher {
    Dispatcher::with_handler(handler_fn(|ctx| {
        Box::pin(async move {
            match ctx.request().path() {
                "/slow" => tokio::time::sleep(Duration::from_millis(200)).await,
                "/panic" => panic!("actuator jammed"),
                _ => {}
            }
            ctx.response_mut().set_status(StatusCode::Ok);
            ctx.response_mut().set_body(Body::text("fine"));
            ctx.mark_handled();
            Ok(())
        })
    }))
}

#[tokio::test]
async fn aborted_peer_does_not_stop_the_listener() {
    let addr = start(slow_or_panicking()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /slow HTTP/1.1\r\n\r\n").await.unwrap();
    #[allow(deprecated)]
    let linger = stream.set_linger(Some(Duration::ZERO));
    linger.unwrap();
    drop(stream);

    // Let the handler finish and hit the reset socket.
    tokio::time::sleep(Duration::from_millis(400)).await;

    let response = exchange(addr, b"GET /status HTTP/1.1\r\n\r\n").await;
    let (head, body) = split(&response);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body, b"fine");
}

#[tokio::test]
async fn panicking_request_does_not_affect_the_next() {
    let addr = start(slow_or_panicking()).await;

    let failed = exchange(addr, b"GET /panic HTTP/1.1\r\n\r\n").await;
    let (head, body) = split(&failed);
    assert!(head.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["type"], "panic");
    assert_eq!(json["message"], "actuator jammed");

    let response = exchange(addr, b"GET /status HTTP/1.1\r\n\r\n").await;
    assert!(split(&response).0.starts_with("HTTP/1.1 200 OK\r\n"));
}

#[tokio::test]
async fn shutdown_signal_stops_accepting() {
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    let (tx, rx) = oneshot::channel::<()>();

    let running = tokio::spawn(server.run_with_shutdown(status_handler(), async {
        let _ = rx.await;
    }));

    let response = exchange(addr, b"GET /status HTTP/1.1\r\n\r\n").await;
    assert!(split(&response).0.starts_with("HTTP/1.1 200 OK"));

    tx.send(()).unwrap();
    running.await.unwrap().unwrap();

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn bind_conflict_is_reported() {
    let first = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = first.local_addr().to_string();
    let err = Server::bind(&addr).await.err().unwrap();
    assert!(matches!(err, rspond::ServerError::Bind { .. }));
}
