//! stammtisch-chat – Raum, Sessions und Verlaufs-Archiv
//!
//! Dieses Crate implementiert:
//! - Room: sequentieller Koordinator, einziger Besitzer der Mitgliederliste
//! - Session: Aktor pro Verbindung mit Eingangs- und Ausgangs-Task
//! - Archiv: Hintergrund-Worker fuer Speichern und Laden des Verlaufs
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use stammtisch_chat::{Archiv, Room, WiederholungsRichtlinie};
//! use stammtisch_db::SqliteDb;
//! use stammtisch_observability::ChatMetriken;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let db = Arc::new(SqliteDb::in_memory().await.unwrap());
//!     let metriken = ChatMetriken::neu().unwrap();
//!     let shutdown = CancellationToken::new();
//!
//!     let (archiv, archiv_handle) =
//!         Archiv::neu(db, 1024, WiederholungsRichtlinie::default(), metriken.clone());
//!     tokio::spawn(archiv.ausfuehren());
//!
//!     let (room, raum) = Room::neu("Chat", 256, archiv_handle, metriken, shutdown.clone());
//!     tokio::spawn(room.ausfuehren());
//!
//!     // Sessions erhalten einen Klon von `raum`
//!     let _ = raum.mitglieder().await;
//! }
//! ```

pub mod archiv;
pub mod error;
pub mod room;
pub mod session;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use archiv::{Archiv, ArchivAuftrag, ArchivHandle, WiederholungsRichtlinie};
pub use error::{ChatError, ChatResult};
pub use room::{
    RaumBefehl, RaumMitglied, Room, RoomHandle, SessionHandle, STANDARD_RAUM_WARTESCHLANGE,
};
pub use session::{Session, SessionOptionen};
