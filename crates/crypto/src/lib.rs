//! # stammtisch-crypto
//!
//! Transport-Sicherheit fuer Stammtisch.
//!
//! ## Module
//! - `mtls` - Mutual-TLS Server/Client-Konfiguration (rustls, CA-Pool)
//! - `identitaet` - Mitglieds-Identitaet aus dem Client-Zertifikat
//! - `pki` - Entwicklungs-PKI (CA, Server- und Client-Zertifikate via rcgen)
//! - `error` - Fehlertypen

pub mod error;
pub mod identitaet;
pub mod mtls;
pub mod pki;

// Bequeme Re-Exports
pub use error::{CryptoError, CryptoResult};
pub use identitaet::{common_name, mitglied_aus_zertifikaten, ANONYMES_MITGLIED};
pub use mtls::{
    compute_certificate_fingerprint, MtlsClient, MtlsClientConfig, MtlsServer, MtlsServerConfig,
};
pub use pki::{EntwicklungsCa, PkiPfade, ZertifikatPaar};
