//! Endpunkt-Tests ueber rohes HTTP/1.1 gegen einen echten Listener

use stammtisch_observability::{observability_server_ausfuehren, ChatMetriken, HealthState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

async fn abrufen(addr: std::net::SocketAddr, pfad: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let anfrage = format!("GET {pfad} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(anfrage.as_bytes()).await.unwrap();

    let mut antwort = String::new();
    stream.read_to_string(&mut antwort).await.unwrap();
    antwort
}

#[tokio::test]
async fn metrics_und_health_erreichbar() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let metriken = ChatMetriken::neu().unwrap();
    metriken.aktive_sessions.set(4);
    let health = HealthState::neu();
    let shutdown = CancellationToken::new();

    let server = tokio::spawn(observability_server_ausfuehren(
        listener,
        metriken,
        health.clone(),
        shutdown.clone(),
    ));

    let metrics = abrufen(addr, "/metrics").await;
    assert!(metrics.starts_with("HTTP/1.1 200"));
    assert!(metrics.contains("stammtisch_aktive_sessions 4"));

    let gesund = abrufen(addr, "/health").await;
    assert!(gesund.starts_with("HTTP/1.1 200"));
    assert!(gesund.contains("\"status\":\"healthy\""));

    health.herunterfahren_melden();
    let krank = abrufen(addr, "/health").await;
    assert!(krank.starts_with("HTTP/1.1 503"));

    shutdown.cancel();
    server.await.unwrap().unwrap();
}
