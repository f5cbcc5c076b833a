use crate::common::{Fixture, IDLE_SCRIPT};
use craft_runner::config::HttpConfig;
use craft_runner::http::HttpServerHandle;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Connects to the console route and reads until the first console line.
fn open_console(addr: SocketAddr, id: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    write!(
        stream,
        "GET /servers/{}/console HTTP/1.1\r\nHost: localhost\r\n\r\n",
        id
    )
    .unwrap();

    let mut received = Vec::new();
    let mut buf = [0u8; 1024];
    while !String::from_utf8_lossy(&received).contains("data: ready") {
        let n = stream.read(&mut buf).unwrap();
        assert!(n > 0, "connection closed before the first console line");
        received.extend_from_slice(&buf[..n]);
    }
    stream
}

#[actix_web::test]
async fn test_shutdown_does_not_wait_for_console_viewers() {
    let fixture = Fixture::new();
    let record = fixture.install("Idle", IDLE_SCRIPT);
    fixture.orchestrator.start(&record.id).await.unwrap();

    let config = HttpConfig {
        address: "127.0.0.1".to_string(),
        port: 0,
        shutdown_timeout_secs: 1,
        ..HttpConfig::default()
    };
    let http = HttpServerHandle::start(Arc::clone(&fixture.orchestrator), &config).unwrap();
    let addr = http.local_addrs()[0];

    let id = record.id.clone();
    let viewer = tokio::task::spawn_blocking(move || open_console(addr, &id))
        .await
        .unwrap();

    // The viewer stays connected; shutdown must still finish promptly
    let started = Instant::now();
    tokio::time::timeout(Duration::from_secs(10), http.shutdown())
        .await
        .expect("HTTP shutdown waited for the open console stream");
    assert!(started.elapsed() < Duration::from_secs(10));

    drop(viewer);
    fixture.orchestrator.shutdown().await.unwrap();
}
