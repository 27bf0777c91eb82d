//! stammtisch-signaling – mTLS/WebSocket-Gateway
//!
//! Dieses Crate laesst nur Clients mit gueltigem Client-Zertifikat in den
//! Raum und startet fuer jede zugelassene Verbindung eine Session.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (ConnectionGateway)
//!     |
//!     v
//! TLS-Handshake (MtlsServer, Client-Zertifikat Pflicht)
//!     |  Mitgliedsname = CN des Client-Zertifikats
//!     v
//! WebSocket-Upgrade (nur "/")
//!     |
//!     v
//! Session (stammtisch-chat) -> Join -> Verlauf -> Live-Verkehr
//! ```

pub mod error;
pub mod gateway;

// Bequeme Re-Exporte
pub use error::{SignalingError, SignalingResult};
pub use gateway::{ConnectionGateway, GatewayConfig, WEBSOCKET_PFAD};
