//! mTLS-Konfiguration und PEM-Parsing
//!
//! Die drei PEM-Artefakte (Server-Zertifikat, Server-Schluessel,
//! CA-Zertifikat) werden als Pfade konfiguriert und beim Start geladen.

use std::path::Path;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::RootCertStore;
use rustls_pemfile::{certs, private_key};

use crate::error::{CryptoError, CryptoResult};

/// mTLS-Server-Konfiguration (PEM-kodiert)
#[derive(Debug, Clone)]
pub struct MtlsServerConfig {
    /// Zertifikatskette des Servers
    pub zertifikat_pem: String,
    /// Privater Schluessel des Servers
    pub schluessel_pem: String,
    /// CA-Zertifikat(e), gegen die Client-Zertifikate geprueft werden
    pub ca_pem: String,
}

impl MtlsServerConfig {
    /// Laedt die drei PEM-Artefakte von der Platte
    pub fn aus_dateien(zertifikat: &Path, schluessel: &Path, ca: &Path) -> CryptoResult<Self> {
        Ok(Self {
            zertifikat_pem: datei_lesen(zertifikat)?,
            schluessel_pem: datei_lesen(schluessel)?,
            ca_pem: datei_lesen(ca)?,
        })
    }
}

/// mTLS-Client-Konfiguration (PEM-kodiert)
///
/// Ohne Zertifikat/Schluessel verbindet sich der Client anonym, was ein
/// mTLS-Server ablehnt.
#[derive(Debug, Clone)]
pub struct MtlsClientConfig {
    /// CA-Zertifikat, gegen das das Server-Zertifikat geprueft wird
    pub ca_pem: String,
    /// Client-Zertifikat (optional)
    pub zertifikat_pem: Option<String>,
    /// Privater Schluessel des Clients (optional)
    pub schluessel_pem: Option<String>,
}

impl MtlsClientConfig {
    pub fn neu(ca_pem: String, zertifikat_pem: String, schluessel_pem: String) -> Self {
        Self {
            ca_pem,
            zertifikat_pem: Some(zertifikat_pem),
            schluessel_pem: Some(schluessel_pem),
        }
    }

    pub fn ohne_zertifikat(ca_pem: String) -> Self {
        Self {
            ca_pem,
            zertifikat_pem: None,
            schluessel_pem: None,
        }
    }
}

/// Berechnet den SHA-256 Fingerprint eines DER-kodierten Zertifikats
pub fn compute_certificate_fingerprint(der_bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(der_bytes);
    hash.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Fester Crypto-Provider (ring), unabhaengig vom Prozess-Default
pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

pub(crate) fn parse_certificates(pem: &str) -> CryptoResult<Vec<CertificateDer<'static>>> {
    let mut cursor = std::io::Cursor::new(pem.as_bytes());
    let zertifikate = certs(&mut cursor)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CryptoError::ZertifikatParsing(e.to_string()))?;

    if zertifikate.is_empty() {
        return Err(CryptoError::ZertifikatParsing(
            "Kein Zertifikat im PEM gefunden".to_string(),
        ));
    }
    Ok(zertifikate)
}

pub(crate) fn parse_private_key(pem: &str) -> CryptoResult<PrivateKeyDer<'static>> {
    let mut cursor = std::io::Cursor::new(pem.as_bytes());
    private_key(&mut cursor)
        .map_err(|e| CryptoError::ZertifikatParsing(format!("Schluessel-Parsing: {}", e)))?
        .ok_or_else(|| CryptoError::ZertifikatParsing("Kein privater Schluessel gefunden".to_string()))
}

/// Baut einen Root-Store aus allen Zertifikaten im CA-PEM
pub(crate) fn root_store(ca_pem: &str) -> CryptoResult<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for ca in parse_certificates(ca_pem)? {
        roots
            .add(ca)
            .map_err(|e| CryptoError::Tls(format!("CA-Zertifikat ungueltig: {}", e)))?;
    }
    Ok(roots)
}

fn datei_lesen(pfad: &Path) -> CryptoResult<String> {
    std::fs::read_to_string(pfad).map_err(|e| CryptoError::datei(pfad, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
