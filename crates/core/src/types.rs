//! Gemeinsame Wertetypen fuer Stammtisch
//!
//! `Nachricht` und `Mitglied` sind unveraenderliche Werte, die per Kopie
//! zwischen den Komponenten fliessen. `SessionId` verwendet das
//! Newtype-Pattern, damit Sessions im Raum eindeutig adressierbar sind.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Session-ID (eine pro Verbindung)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Erstellt eine neue zufaellige SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Eine Chat-Nachricht
///
/// Wire-Format ist ein JSON-Objekt `{"from": "...", "content": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nachricht {
    pub from: String,
    pub content: String,
}

impl Nachricht {
    /// Erstellt eine neue Nachricht
    pub fn neu(from: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            content: content.into(),
        }
    }

    /// Serialisiert die Nachricht als JSON-Text (Wire-Format)
    pub fn als_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Beschreibende Attribute eines Mitglieds (alle optional)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MitgliedProfil {
    pub alter: Option<u32>,
    pub ort: Option<String>,
    pub interessen: Vec<String>,
}

/// Identitaet eines verbundenen Clients
///
/// Der Name stempelt jede ausgehende Nachricht (`Nachricht::from`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mitglied {
    pub name: String,
    #[serde(default)]
    pub profil: MitgliedProfil,
}

impl Mitglied {
    /// Erstellt ein Mitglied mit leerem Profil
    pub fn neu(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profil: MitgliedProfil::default(),
        }
    }

    /// Setzt das Profil
    pub fn mit_profil(mut self, profil: MitgliedProfil) -> Self {
        self.profil = profil;
        self
    }

    /// Erstellt eine Nachricht im Namen dieses Mitglieds
    pub fn nachricht(&self, content: impl Into<String>) -> Nachricht {
        Nachricht::neu(self.name.clone(), content)
    }
}

/// Lebenszyklus einer Session
///
/// ```text
/// Aktiv -> Schliessend -> Geschlossen
/// ```
///
/// Es gibt keinen Uebergang aus `Geschlossen` heraus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionZustand {
    /// Beide Schleifen laufen
    Aktiv,
    /// Abbau wurde eingeleitet
    Schliessend,
    /// Endzustand, Lebenszyklus-Signal wurde ausgeloest
    Geschlossen,
}

impl SessionZustand {
    /// Gibt true zurueck wenn der Abbau bereits begonnen hat
    pub fn ist_beendet(&self) -> bool {
        !matches!(self, Self::Aktiv)
    }
}
