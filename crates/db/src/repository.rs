//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt den Raum von der konkreten
//! Datenbank-Implementierung. Der Archiv-Worker haelt eine Implementierung
//! und ruft sie aus einem eigenen tokio-Task auf, daher `async_trait`
//! (die Futures muessen `Send` sein).

use async_trait::async_trait;

use crate::error::DbResult;
use crate::models::NachrichtRecord;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://stammtisch.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://stammtisch.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

/// Persistenz des Chat-Verlaufs
#[async_trait]
pub trait NachrichtenRepository: Send + Sync {
    /// Haengt eine Nachricht an und gibt ihre ID zurueck
    async fn append(&self, from: &str, content: &str) -> DbResult<i64>;

    /// Laedt alle Nachrichten in Einfuegereihenfolge
    async fn fetch_all(&self) -> DbResult<Vec<NachrichtRecord>>;
}
