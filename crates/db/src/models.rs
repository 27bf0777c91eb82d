//! Datenbankmodelle fuer Stammtisch
//!
//! Reine Datenuebertragungsobjekte, getrennt vom Domain-Typ `Nachricht`.

use serde::{Deserialize, Serialize};

/// Nachrichten-Datensatz aus der Tabelle `messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NachrichtRecord {
    pub id: i64,
    pub from: String,
    pub content: String,
}
