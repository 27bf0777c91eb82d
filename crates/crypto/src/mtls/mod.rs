//! Mutual-TLS Transport-Verschluesselung (Client <-> Server)
//!
//! Der Server praesentiert sein eigenes Zertifikat und verlangt von jedem
//! Client ein Zertifikat, das auf den konfigurierten CA-Pool zurueckfuehrt.
//! Verbindungen ohne gueltiges Client-Zertifikat scheitern im Handshake.

pub mod client;
pub mod config;
pub mod server;

pub use client::MtlsClient;
pub use config::{compute_certificate_fingerprint, MtlsClientConfig, MtlsServerConfig};
pub use server::MtlsServer;
