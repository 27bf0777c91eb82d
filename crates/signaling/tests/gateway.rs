//! End-to-End-Tests: echter TCP-Listener, mTLS, WebSocket, Raum und Archiv

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rustls::pki_types::ServerName;
use stammtisch_chat::{Archiv, Room, RoomHandle, WiederholungsRichtlinie};
use stammtisch_core::Nachricht;
use stammtisch_crypto::{EntwicklungsCa, MtlsClient, MtlsClientConfig, MtlsServer, MtlsServerConfig};
use stammtisch_db::SqliteDb;
use stammtisch_observability::ChatMetriken;
use stammtisch_signaling::{ConnectionGateway, GatewayConfig, SignalingResult};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const FRIST: Duration = Duration::from_secs(5);

type Client = WebSocketStream<tokio_rustls::client::TlsStream<TcpStream>>;
type Fehler = Box<dyn std::error::Error + Send + Sync>;

struct Umgebung {
    adresse: SocketAddr,
    ca: EntwicklungsCa,
    raum: RoomHandle,
    metriken: ChatMetriken,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    gateway: JoinHandle<SignalingResult<()>>,
}

impl Umgebung {
    async fn starten() -> Self {
        let ca = EntwicklungsCa::erzeugen("Test-CA").unwrap();
        let server = ca.server_zertifikat(&["localhost"]).unwrap();
        let tls = MtlsServer::new(&MtlsServerConfig {
            zertifikat_pem: server.zertifikat_pem,
            schluessel_pem: server.schluessel_pem,
            ca_pem: ca.ca_pem().to_string(),
        })
        .unwrap();

        let db = Arc::new(SqliteDb::in_memory().await.unwrap());
        let metriken = ChatMetriken::neu().unwrap();
        let shutdown = CancellationToken::new();

        let (archiv, archiv_handle) =
            Archiv::neu(db, 64, WiederholungsRichtlinie::default(), metriken.clone());
        tokio::spawn(archiv.ausfuehren());

        let (room, raum) = Room::neu("Chat", 64, archiv_handle, metriken.clone(), shutdown.clone());
        tokio::spawn(room.ausfuehren());

        let gateway = ConnectionGateway::binden(
            "127.0.0.1:0",
            tls,
            raum.clone(),
            GatewayConfig::default(),
            metriken.clone(),
        )
        .await
        .unwrap();
        let adresse = gateway.lokale_adresse().unwrap();

        let tracker = TaskTracker::new();
        let gateway = tokio::spawn(gateway.starten(tracker.clone(), shutdown.clone()));

        Self {
            adresse,
            ca,
            raum,
            metriken,
            shutdown,
            tracker,
            gateway,
        }
    }

    fn client_config(&self, name: &str) -> MtlsClientConfig {
        let paar = self.ca.client_zertifikat(name).unwrap();
        MtlsClientConfig::neu(self.ca.ca_pem().to_string(), paar.zertifikat_pem, paar.schluessel_pem)
    }

    async fn verbinden(&self, name: &str) -> Client {
        verbinden(self.adresse, &self.client_config(name), "/")
            .await
            .expect("Verbindung aufbauen")
    }

    async fn mitglieder(&self) -> Vec<String> {
        let mut namen: Vec<String> = self
            .raum
            .mitglieder()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.mitglied.name)
            .collect();
        namen.sort();
        namen
    }
}

async fn verbinden(adresse: SocketAddr, config: &MtlsClientConfig, pfad: &str) -> Result<Client, Fehler> {
    let client = MtlsClient::new(config)?;
    let tcp = TcpStream::connect(adresse).await?;
    let tls = client
        .connector
        .connect(ServerName::try_from("localhost")?, tcp)
        .await?;
    let (ws, _) = tokio_tungstenite::client_async(format!("wss://localhost{pfad}"), tls).await?;
    Ok(ws)
}

async fn lesen(client: &mut Client) -> Nachricht {
    loop {
        let frame = tokio::time::timeout(FRIST, client.next())
            .await
            .expect("Frame erwartet")
            .expect("Stream offen")
            .expect("gueltiger Frame");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn warten_bis(mut bedingung: impl FnMut() -> bool) {
    for _ in 0..500 {
        if bedingung() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Bedingung nicht rechtzeitig erfuellt");
}

#[tokio::test]
async fn test_echo_mit_namen_aus_zertifikat() {
    let u = Umgebung::starten().await;
    let mut alice = u.verbinden("alice").await;

    alice.send(Message::text("hi")).await.unwrap();
    assert_eq!(lesen(&mut alice).await, Nachricht::neu("alice", "hi"));
    assert_eq!(u.mitglieder().await, vec!["alice"]);
    assert_eq!(u.metriken.aktive_sessions.get(), 1);
}

#[tokio::test]
async fn test_nachzuegler_bekommt_verlauf_vor_live_nachrichten() {
    let u = Umgebung::starten().await;
    let mut alice = u.verbinden("alice").await;

    alice.send(Message::text("hi")).await.unwrap();
    assert_eq!(lesen(&mut alice).await, Nachricht::neu("alice", "hi"));

    let mut bob = u.verbinden("bob").await;
    assert_eq!(lesen(&mut bob).await, Nachricht::neu("alice", "hi"));

    alice.send(Message::text("yo")).await.unwrap();
    assert_eq!(lesen(&mut alice).await, Nachricht::neu("alice", "yo"));
    assert_eq!(lesen(&mut bob).await, Nachricht::neu("alice", "yo"));

    bob.send(Message::text("servus")).await.unwrap();
    assert_eq!(lesen(&mut alice).await, Nachricht::neu("bob", "servus"));
    assert_eq!(lesen(&mut bob).await, Nachricht::neu("bob", "servus"));

    assert_eq!(u.mitglieder().await, vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_client_ohne_zertifikat_wird_abgelehnt() {
    let u = Umgebung::starten().await;
    let config = MtlsClientConfig::ohne_zertifikat(u.ca.ca_pem().to_string());

    assert!(verbinden(u.adresse, &config, "/").await.is_err());

    warten_bis(|| u.metriken.abgelehnte_handshakes_total.get() == 1).await;
    assert!(u.mitglieder().await.is_empty());
    assert_eq!(u.metriken.aktive_sessions.get(), 0);
}

#[tokio::test]
async fn test_zertifikat_fremder_ca_aendert_raum_nicht() {
    let u = Umgebung::starten().await;
    let mut alice = u.verbinden("alice").await;
    alice.send(Message::text("hi")).await.unwrap();
    lesen(&mut alice).await;

    let fremde_ca = EntwicklungsCa::erzeugen("Fremde-CA").unwrap();
    let mallory = fremde_ca.client_zertifikat("mallory").unwrap();
    let config = MtlsClientConfig::neu(
        u.ca.ca_pem().to_string(),
        mallory.zertifikat_pem,
        mallory.schluessel_pem,
    );

    assert!(verbinden(u.adresse, &config, "/").await.is_err());
    warten_bis(|| u.metriken.abgelehnte_handshakes_total.get() == 1).await;

    // Bestehende Session laeuft unveraendert weiter
    assert_eq!(u.mitglieder().await, vec!["alice"]);
    alice.send(Message::text("noch da")).await.unwrap();
    assert_eq!(lesen(&mut alice).await, Nachricht::neu("alice", "noch da"));
}

#[tokio::test]
async fn test_upgrade_nur_auf_wurzelpfad() {
    let u = Umgebung::starten().await;
    let config = u.client_config("alice");

    let fehler = verbinden(u.adresse, &config, "/chat").await.err().expect("Upgrade abgelehnt");
    assert!(fehler.to_string().contains("404"), "unerwartet: {fehler}");

    warten_bis(|| u.metriken.abgelehnte_handshakes_total.get() == 1).await;
    assert!(u.mitglieder().await.is_empty());
}

#[tokio::test]
async fn test_client_trennt_und_verlaesst_raum() {
    let u = Umgebung::starten().await;
    let mut alice = u.verbinden("alice").await;
    let mut bob = u.verbinden("bob").await;

    bob.send(Message::text("tschuess")).await.unwrap();
    lesen(&mut bob).await;
    lesen(&mut alice).await;
    bob.close(None).await.unwrap();

    warten_bis(|| u.metriken.aktive_sessions.get() == 1).await;
    assert_eq!(u.mitglieder().await, vec!["alice"]);
}

#[tokio::test]
async fn test_shutdown_beendet_gateway_und_sessions() {
    let u = Umgebung::starten().await;
    let mut alice = u.verbinden("alice").await;
    alice.send(Message::text("hi")).await.unwrap();
    lesen(&mut alice).await;

    u.shutdown.cancel();
    tokio::time::timeout(FRIST, u.gateway)
        .await
        .expect("Gateway endet")
        .unwrap()
        .unwrap();

    u.tracker.close();
    tokio::time::timeout(FRIST, u.tracker.wait())
        .await
        .expect("Alle Sessions beendet");
    assert_eq!(u.metriken.aktive_sessions.get(), 0);

    // Client sieht Close-Frame, Fehler oder Stream-Ende
    let rest = tokio::time::timeout(FRIST, alice.next()).await.unwrap();
    assert!(!matches!(rest, Some(Ok(Message::Text(_)))));

    // Listener ist geschlossen
    assert!(TcpStream::connect(u.adresse).await.is_err());
}
