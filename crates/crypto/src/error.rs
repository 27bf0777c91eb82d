//! Fehlertypen fuer das Kryptografie-Subsystem

use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Zertifikat-Generierung fehlgeschlagen: {0}")]
    ZertifikatGenerierung(String),

    #[error("Zertifikat-Parsing fehlgeschlagen: {0}")]
    ZertifikatParsing(String),

    #[error("Datei '{pfad}' nicht lesbar/schreibbar: {fehler}")]
    Datei {
        pfad: String,
        fehler: std::io::Error,
    },

    #[error("TLS-Fehler: {0}")]
    Tls(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// Erstellt einen Dateifehler mit Pfadangabe
    pub fn datei(pfad: &std::path::Path, fehler: std::io::Error) -> Self {
        Self::Datei {
            pfad: pfad.display().to_string(),
            fehler,
        }
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
