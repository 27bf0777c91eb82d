//! stammtisch-core – Gemeinsame Typen
//!
//! Dieses Crate stellt die Wertetypen bereit, die zwischen Gateway, Raum,
//! Session und Persistenz ausgetauscht werden.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{Mitglied, MitgliedProfil, Nachricht, SessionId, SessionZustand};
