//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist (die TLS-Dateien muessen trotzdem existieren).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stammtisch_chat::{SessionOptionen, WiederholungsRichtlinie};
use stammtisch_db::DatabaseConfig;
use stammtisch_signaling::GatewayConfig;

/// Umgebungsvariable fuer den Pfad der Konfigurationsdatei
pub const ENV_CONFIG: &str = "STAMMTISCH_CONFIG";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Raum- und Session-Einstellungen
    pub server: ServerEinstellungen,
    pub netzwerk: NetzwerkEinstellungen,
    pub tls: TlsEinstellungen,
    pub datenbank: DatenbankEinstellungen,
    /// Persistenz-Worker
    pub archiv: ArchivEinstellungen,
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Raum- und Session-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Name des Raums
    pub name: String,
    /// Kapazitaet des ausgehenden Postfachs pro Session
    pub postfach_kapazitaet: usize,
    /// Groesse des Raum-Postfachs (Join/Leave/Broadcast)
    pub raum_warteschlange: usize,
    /// Obergrenze fuer das geordnete Herunterfahren
    pub shutdown_timeout_sek: u64,
    /// Frist fuer TLS-Handshake und WebSocket-Upgrade
    pub handshake_timeout_sek: u64,
    /// Wartezeit einer neuen Session auf den Verlauf
    pub historie_timeout_sek: u64,
    /// Maximale Groesse einer eingehenden Nachricht in Bytes
    pub max_nachrichtengroesse: usize,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Chat".into(),
            postfach_kapazitaet: 1,
            raum_warteschlange: stammtisch_chat::STANDARD_RAUM_WARTESCHLANGE,
            shutdown_timeout_sek: 5,
            handshake_timeout_sek: 10,
            historie_timeout_sek: 5,
            max_nachrichtengroesse: 64 * 1024,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse (Hostname oder IP)
    pub bind_adresse: String,
    /// Port fuer mTLS/WebSocket
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "localhost".into(),
            port: 8080,
        }
    }
}

/// Pfade zum TLS-Material (PEM)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsEinstellungen {
    pub server_zertifikat: PathBuf,
    pub server_schluessel: PathBuf,
    /// CA, gegen die Client-Zertifikate geprueft werden
    pub ca_zertifikat: PathBuf,
}

impl Default for TlsEinstellungen {
    fn default() -> Self {
        Self {
            server_zertifikat: "cert/serv/server-cert.pem".into(),
            server_schluessel: "cert/serv/server-key.pem".into(),
            ca_zertifikat: "cert/ca/ca-cert.pem".into(),
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    pub sqlite_wal: bool,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        Self {
            url: "sqlite://stammtisch.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

/// Archiv-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchivEinstellungen {
    /// Groesse der Auftrags-Queue; bei voller Queue wird verworfen
    pub warteschlange: usize,
    /// Versuche pro Nachricht
    pub versuche: u32,
    pub start_verzoegerung_ms: u64,
    pub max_verzoegerung_ms: u64,
}

impl Default for ArchivEinstellungen {
    fn default() -> Self {
        Self {
            warteschlange: 1024,
            versuche: 3,
            start_verzoegerung_ms: 100,
            max_verzoegerung_ms: 2000,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level bzw. Filter: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die vollstaendige Bind-Adresse des Gateways zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_sek)
    }

    pub fn datenbank_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.datenbank.url.clone(),
            max_verbindungen: self.datenbank.max_verbindungen,
            sqlite_wal: self.datenbank.sqlite_wal,
        }
    }

    pub fn wiederholungs_richtlinie(&self) -> WiederholungsRichtlinie {
        WiederholungsRichtlinie {
            versuche: self.archiv.versuche,
            start_verzoegerung: Duration::from_millis(self.archiv.start_verzoegerung_ms),
            max_verzoegerung: Duration::from_millis(self.archiv.max_verzoegerung_ms),
        }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            handshake_timeout: Duration::from_secs(self.server.handshake_timeout_sek),
            max_nachrichtengroesse: self.server.max_nachrichtengroesse,
            session: SessionOptionen {
                postfach_kapazitaet: self.server.postfach_kapazitaet,
                historie_timeout: Duration::from_secs(self.server.historie_timeout_sek),
                ..SessionOptionen::default()
            },
        }
    }
}
