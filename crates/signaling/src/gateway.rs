//! ConnectionGateway – mTLS-Handshake, WebSocket-Upgrade, Session-Start
//!
//! Ablauf pro Verbindung:
//! ```text
//! TCP accept -> TLS (Client-Zertifikat Pflicht) -> Upgrade auf "/" -> Session
//! ```
//! Scheitert ein Schritt, wird die Verbindung verworfen, bevor eine Session
//! entsteht; der Raum sieht davon nichts.
//!
//! Verbindungs-Tasks laufen auf einem `TaskTracker`, damit der Server beim
//! Herunterfahren auf alle Sessions warten kann.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use stammtisch_chat::{RoomHandle, Session, SessionOptionen};
use stammtisch_core::Mitglied;
use stammtisch_crypto::{mitglied_aus_zertifikaten, MtlsServer};
use stammtisch_observability::ChatMetriken;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_rustls::server::TlsStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{SignalingError, SignalingResult};

/// Einziger Pfad, auf dem ein Upgrade erlaubt ist
pub const WEBSOCKET_PFAD: &str = "/";

/// Gateway-Konfiguration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Frist fuer TLS-Handshake und WebSocket-Upgrade (jeweils)
    pub handshake_timeout: Duration,
    /// Maximale Groesse einer eingehenden Nachricht in Bytes
    pub max_nachrichtengroesse: usize,
    pub session: SessionOptionen,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            max_nachrichtengroesse: 64 * 1024,
            session: SessionOptionen::default(),
        }
    }
}

/// Geteilter Zustand aller Verbindungs-Tasks
struct GatewayKern {
    tls: MtlsServer,
    raum: RoomHandle,
    config: GatewayConfig,
    metriken: ChatMetriken,
}

/// Gateway mit gebundenem Listener
pub struct ConnectionGateway {
    listener: TcpListener,
    kern: Arc<GatewayKern>,
}

impl ConnectionGateway {
    /// Bindet den Listener; Port 0 waehlt einen freien Port
    pub async fn binden(
        addr: impl ToSocketAddrs,
        tls: MtlsServer,
        raum: RoomHandle,
        config: GatewayConfig,
        metriken: ChatMetriken,
    ) -> SignalingResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            kern: Arc::new(GatewayKern {
                tls,
                raum,
                config,
                metriken,
            }),
        })
    }

    /// Tatsaechlich gebundene Adresse
    pub fn lokale_adresse(&self) -> SignalingResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept-Loop
    ///
    /// Laeuft bis `shutdown` ausgeloest wird. Jede Verbindung wird auf
    /// `tracker` gestartet und erhaelt ein Child-Token von `shutdown`.
    pub async fn starten(self, tracker: TaskTracker, shutdown: CancellationToken) -> SignalingResult<()> {
        tracing::info!(
            adresse = %self.lokale_adresse()?,
            raum = %self.kern.raum.name(),
            "Gateway gestartet"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    tracing::info!("Gateway: Shutdown-Signal empfangen");
                    break;
                }

                ergebnis = self.listener.accept() => match ergebnis {
                    Ok((stream, peer)) => {
                        tracing::debug!(peer = %peer, "Verbindung akzeptiert");
                        let kern = Arc::clone(&self.kern);
                        let token = shutdown.child_token();
                        tracker.spawn(async move {
                            kern.verbindung_verarbeiten(stream, peer, token).await;
                        });
                    }
                    Err(e) => {
                        tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
            }
        }

        tracing::info!("Gateway gestoppt");
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGateway")
            .field("adresse", &self.listener.local_addr().ok())
            .field("raum", &self.kern.raum.name())
            .finish()
    }
}

impl GatewayKern {
    async fn verbindung_verarbeiten(&self, stream: TcpStream, peer: SocketAddr, token: CancellationToken) {
        let aufbau = tokio::select! {
            biased;
            _ = token.cancelled() => Err(SignalingError::Abgebrochen),
            ergebnis = self.handshake(stream) => ergebnis,
        };

        let (mitglied, ws) = match aufbau {
            Ok(aufbau) => aufbau,
            Err(SignalingError::Abgebrochen) => return,
            Err(e) => {
                self.metriken.abgelehnte_handshakes_total.inc();
                tracing::warn!(peer = %peer, fehler = %e, "Verbindung abgelehnt");
                return;
            }
        };

        tracing::info!(peer = %peer, mitglied = %mitglied.name, "Client zugelassen");

        let session = Session::neu(mitglied, ws, self.raum.clone(), self.config.session, token);
        self.metriken.aktive_sessions.inc();
        session.ausfuehren().await;
        self.metriken.aktive_sessions.dec();
    }

    /// TLS-Handshake mit Zertifikatspruefung, danach Upgrade
    async fn handshake(
        &self,
        stream: TcpStream,
    ) -> SignalingResult<(Mitglied, WebSocketStream<TlsStream<TcpStream>>)> {
        let frist = self.config.handshake_timeout;

        let tls_stream = tokio::time::timeout(frist, self.tls.acceptor.accept(stream))
            .await
            .map_err(|_| SignalingError::Timeout("TLS-Handshake"))?
            .map_err(SignalingError::Tls)?;

        let (_, verbindung) = tls_stream.get_ref();
        let mitglied = mitglied_aus_zertifikaten(verbindung.peer_certificates());

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_nachrichtengroesse);
        ws_config.max_frame_size = Some(self.config.max_nachrichtengroesse);

        let ws = tokio::time::timeout(
            frist,
            tokio_tungstenite::accept_hdr_async_with_config(tls_stream, pfad_pruefen, Some(ws_config)),
        )
        .await
        .map_err(|_| SignalingError::Timeout("WebSocket-Upgrade"))??;

        Ok((mitglied, ws))
    }
}

/// Erlaubt das Upgrade nur auf `WEBSOCKET_PFAD`
#[allow(clippy::result_large_err)]
fn pfad_pruefen(anfrage: &Request, antwort: Response) -> Result<Response, ErrorResponse> {
    if anfrage.uri().path() == WEBSOCKET_PFAD {
        return Ok(antwort);
    }

    tracing::debug!(pfad = %anfrage.uri().path(), "Upgrade auf unbekanntem Pfad");
    let mut fehler = ErrorResponse::new(Some("Nicht gefunden".to_string()));
    *fehler.status_mut() = StatusCode::NOT_FOUND;
    Err(fehler)
}
