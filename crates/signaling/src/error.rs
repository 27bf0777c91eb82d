//! Fehlertypen fuer das Gateway

use thiserror::Error;

/// Fehlertyp fuer das Gateway
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// TLS-Handshake gescheitert (z.B. Client-Zertifikat fehlt oder ist fremd)
    #[error("TLS-Handshake fehlgeschlagen: {0}")]
    Tls(std::io::Error),

    /// WebSocket-Upgrade gescheitert
    #[error("WebSocket-Upgrade fehlgeschlagen: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Handshake hat die Frist ueberschritten
    #[error("Timeout im {0}")]
    Timeout(&'static str),

    /// Server faehrt herunter
    #[error("Abgebrochen")]
    Abgebrochen,
}

/// Result-Typ fuer das Gateway
pub type SignalingResult<T> = Result<T, SignalingError>;
