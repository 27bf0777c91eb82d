//! Fehlertypen fuer das Chat-Crate

use thiserror::Error;

/// Chat-Fehlertypen
#[derive(Debug, Error)]
pub enum ChatError {
    /// Der Raum-Koordinator laeuft nicht mehr (Shutdown)
    #[error("Raum '{0}' ist geschlossen")]
    RaumGeschlossen(String),

    #[error("WebSocket-Fehler: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialisierungsfehler: {0}")]
    Serialisierung(#[from] serde_json::Error),

    /// Schreiben/Lesen wurde durch Abbruch der Session unterbrochen
    #[error("Session abgebrochen")]
    Abgebrochen,
}

pub type ChatResult<T> = Result<T, ChatError>;
