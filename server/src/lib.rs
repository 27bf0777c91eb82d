//! stammtisch-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und stellt den Orchestrator bereit, der
//! alle Subsysteme startet und geordnet wieder herunterfaehrt.

pub mod client;
pub mod config;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use config::ServerConfig;
use stammtisch_chat::{Archiv, Room, RoomHandle};
use stammtisch_crypto::{MtlsServer, MtlsServerConfig};
use stammtisch_db::SqliteDb;
use stammtisch_observability::{observability_server_ausfuehren, ChatMetriken, HealthState};
use stammtisch_signaling::{ConnectionGateway, SignalingResult};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Haelt den Server-Zustand vor dem Start zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis SIGINT/SIGTERM
    pub async fn starten(self) -> Result<()> {
        self.ausfuehren_bis(shutdown_signal()).await?;
        Ok(())
    }

    /// Startet alle Subsysteme und faehrt herunter, sobald `signal` fertig ist
    pub async fn ausfuehren_bis(self, signal: impl Future<Output = ()>) -> Result<ShutdownBericht> {
        let laufend = self.hochfahren().await?;
        tracing::info!(adresse = %laufend.adresse(), "Server laeuft. Warte auf Shutdown-Signal...");
        signal.await;
        Ok(laufend.herunterfahren().await)
    }

    /// Startet alle Subsysteme
    ///
    /// Reihenfolge:
    /// 1. Datenbank oeffnen (inkl. Migrationen)
    /// 2. TLS-Material laden
    /// 3. Archiv-Worker und Raum starten
    /// 4. Gateway binden und starten
    /// 5. Observability-Server (optional)
    pub async fn hochfahren(self) -> Result<LaufenderServer> {
        let config = self.config;

        tracing::info!(
            raum = %config.server.name,
            adresse = %config.bind_adresse(),
            "Server startet"
        );

        let db = Arc::new(
            SqliteDb::oeffnen(&config.datenbank_config())
                .await
                .with_context(|| format!("Datenbank '{}' nicht nutzbar", config.datenbank.url))?,
        );

        let tls_material = MtlsServerConfig::aus_dateien(
            &config.tls.server_zertifikat,
            &config.tls.server_schluessel,
            &config.tls.ca_zertifikat,
        )
        .context("TLS-Material nicht lesbar")?;
        let tls = MtlsServer::new(&tls_material).context("TLS-Konfiguration ungueltig")?;

        let metriken = ChatMetriken::neu()?;
        let health = HealthState::neu();
        let shutdown = CancellationToken::new();

        let (archiv, archiv_handle) = Archiv::neu(
            Arc::clone(&db),
            config.archiv.warteschlange,
            config.wiederholungs_richtlinie(),
            metriken.clone(),
        );
        let archiv_task = tokio::spawn(archiv.mit_health(health.clone()).ausfuehren());

        let (room, raum) = Room::neu(
            config.server.name.clone(),
            config.server.raum_warteschlange,
            archiv_handle,
            metriken.clone(),
            shutdown.clone(),
        );
        let room_task = tokio::spawn(room.ausfuehren());

        let gateway = ConnectionGateway::binden(
            config.bind_adresse(),
            tls,
            raum.clone(),
            config.gateway_config(),
            metriken.clone(),
        )
        .await
        .with_context(|| format!("Bind auf {} fehlgeschlagen", config.bind_adresse()))?;
        let adresse = gateway.lokale_adresse()?;

        let tracker = TaskTracker::new();
        let gateway_task = tokio::spawn(gateway.starten(tracker.clone(), shutdown.clone()));

        let observability_task = if config.observability.aktiviert {
            let listener = tokio::net::TcpListener::bind(config.observability_bind_adresse())
                .await
                .with_context(|| {
                    format!(
                        "Observability-Bind auf {} fehlgeschlagen",
                        config.observability_bind_adresse()
                    )
                })?;
            Some(tokio::spawn(observability_server_ausfuehren(
                listener,
                metriken.clone(),
                health.clone(),
                shutdown.clone(),
            )))
        } else {
            None
        };

        Ok(LaufenderServer {
            adresse,
            raum,
            metriken,
            health,
            shutdown,
            tracker,
            shutdown_timeout: config.shutdown_timeout(),
            db,
            gateway_task,
            room_task,
            archiv_task,
            observability_task,
        })
    }
}

/// Ergebnis des Herunterfahrens: was innerhalb der Frist fertig wurde
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownBericht {
    pub sessions_beendet: bool,
    pub raum_beendet: bool,
    pub archiv_beendet: bool,
}

impl ShutdownBericht {
    pub fn vollstaendig(&self) -> bool {
        self.sessions_beendet && self.raum_beendet && self.archiv_beendet
    }
}

/// Laufender Server
pub struct LaufenderServer {
    adresse: SocketAddr,
    raum: RoomHandle,
    metriken: ChatMetriken,
    health: HealthState,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    shutdown_timeout: Duration,
    db: Arc<SqliteDb>,
    gateway_task: JoinHandle<SignalingResult<()>>,
    room_task: JoinHandle<()>,
    archiv_task: JoinHandle<()>,
    observability_task: Option<JoinHandle<Result<()>>>,
}

impl LaufenderServer {
    /// Adresse des Gateways
    pub fn adresse(&self) -> SocketAddr {
        self.adresse
    }

    pub fn raum(&self) -> &RoomHandle {
        &self.raum
    }

    pub fn metriken(&self) -> &ChatMetriken {
        &self.metriken
    }

    /// Faehrt geordnet herunter, begrenzt durch `shutdown_timeout`
    ///
    /// Bricht das gemeinsame Token ab, nimmt keine Verbindungen mehr an und
    /// wartet dann auf alle Sessions, den Raum und das Archiv. Was bis zum
    /// Ablauf der Frist nicht fertig ist, wird zurueckgelassen.
    pub async fn herunterfahren(self) -> ShutdownBericht {
        let frist = Instant::now() + self.shutdown_timeout;
        tracing::info!(timeout = ?self.shutdown_timeout, "Shutdown eingeleitet");

        self.health.herunterfahren_melden();
        self.shutdown.cancel();

        match timeout_at(frist, self.gateway_task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => tracing::warn!(fehler = %e, "Gateway mit Fehler beendet"),
            Ok(Err(e)) => tracing::error!(fehler = %e, "Gateway-Task abgebrochen"),
            Err(_) => tracing::warn!("Gateway nicht rechtzeitig beendet"),
        }

        self.tracker.close();
        let offen = self.tracker.len();
        let sessions_beendet = timeout_at(frist, self.tracker.wait()).await.is_ok();
        if !sessions_beendet {
            tracing::warn!(
                offen = self.tracker.len(),
                "Nicht alle Sessions rechtzeitig beendet"
            );
        } else {
            tracing::debug!(sessions = offen, "Alle Sessions beendet");
        }

        // Raum-Handle freigeben, danach endet das Archiv sobald der Raum weg ist
        drop(self.raum);
        let raum_beendet = timeout_at(frist, self.room_task).await.is_ok();
        let archiv_beendet = timeout_at(frist, self.archiv_task).await.is_ok();
        if !archiv_beendet {
            tracing::warn!("Archiv nicht rechtzeitig geleert, ausstehende Nachrichten gehen verloren");
        } else {
            self.db.schliessen().await;
        }

        if let Some(task) = self.observability_task {
            match timeout_at(frist, task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => tracing::warn!(fehler = %e, "Observability-Server mit Fehler beendet"),
                Ok(Err(e)) => tracing::error!(fehler = %e, "Observability-Task abgebrochen"),
                Err(_) => tracing::warn!("Observability-Server nicht rechtzeitig beendet"),
            }
        }

        let bericht = ShutdownBericht {
            sessions_beendet,
            raum_beendet,
            archiv_beendet,
        };
        tracing::info!(?bericht, "Server beendet");
        bericht
    }
}

impl std::fmt::Debug for LaufenderServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaufenderServer")
            .field("adresse", &self.adresse)
            .field("raum", &self.raum.name())
            .field("sessions", &self.tracker.len())
            .finish()
    }
}

/// Wartet auf Ctrl-C oder (unter Unix) SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(fehler = %e, "Ctrl-C-Handler nicht installierbar");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(fehler = %e, "SIGTERM-Handler nicht installierbar");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Shutdown-Signal empfangen (SIGINT)"),
        _ = terminate => tracing::info!("Shutdown-Signal empfangen (SIGTERM)"),
    }
}
