//! mTLS-Server (TLS-Acceptor mit Client-Zertifikatspruefung)

use std::sync::Arc;

use rustls::server::WebPkiClientVerifier;
use rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::error::{CryptoError, CryptoResult};
use crate::mtls::config::{
    compute_certificate_fingerprint, crypto_provider, parse_certificates, parse_private_key,
    root_store, MtlsServerConfig,
};

/// mTLS-Server
///
/// Client-Zertifikate sind Pflicht und muessen auf den CA-Pool zurueckfuehren.
#[derive(Clone)]
pub struct MtlsServer {
    pub acceptor: TlsAcceptor,
    pub certificate_fingerprint: String,
}

impl MtlsServer {
    /// Erstellt einen neuen mTLS-Server aus der Konfiguration
    pub fn new(config: &MtlsServerConfig) -> CryptoResult<Self> {
        let cert_chain = parse_certificates(&config.zertifikat_pem)?;
        let private_key = parse_private_key(&config.schluessel_pem)?;
        let roots = root_store(&config.ca_pem)?;
        let provider = crypto_provider();

        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
            .build()
            .map_err(|e| CryptoError::Tls(format!("Client-Verifier: {}", e)))?;

        let certificate_fingerprint = compute_certificate_fingerprint(cert_chain[0].as_ref());

        let tls_config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| CryptoError::Tls(e.to_string()))?
            .with_client_cert_verifier(verifier)
            .with_single_cert(cert_chain, private_key)
            .map_err(|e| CryptoError::Tls(e.to_string()))?;

        tracing::info!(fingerprint = %certificate_fingerprint, "mTLS-Server konfiguriert");

        Ok(Self {
            acceptor: TlsAcceptor::from(Arc::new(tls_config)),
            certificate_fingerprint,
        })
    }

    /// Gibt den Zertifikat-Fingerprint zurueck
    pub fn fingerprint(&self) -> &str {
        &self.certificate_fingerprint
    }
}

impl std::fmt::Debug for MtlsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MtlsServer")
            .field("fingerprint", &self.certificate_fingerprint)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::EntwicklungsCa;

    fn server_config(ca: &EntwicklungsCa) -> MtlsServerConfig {
        let server = ca.server_zertifikat(&["localhost"]).unwrap();
        MtlsServerConfig {
            zertifikat_pem: server.zertifikat_pem,
            schluessel_pem: server.schluessel_pem,
            ca_pem: ca.ca_pem().to_string(),
        }
    }

    #[test]
    fn mtls_server_erstellen() {
        let ca = EntwicklungsCa::erzeugen("Test-CA").unwrap();
        let server = MtlsServer::new(&server_config(&ca)).unwrap();
        assert_eq!(server.fingerprint().split(':').count(), 32);
    }

    #[test]
    fn mtls_server_mit_ungueltigem_cert_schlaegt_fehl() {
        let config = MtlsServerConfig {
            zertifikat_pem: "ungueltig".to_string(),
            schluessel_pem: "ungueltig".to_string(),
            ca_pem: "ungueltig".to_string(),
        };
        assert!(MtlsServer::new(&config).is_err());
    }

    #[test]
    fn mtls_server_ohne_ca_schlaegt_fehl() {
        let ca = EntwicklungsCa::erzeugen("Test-CA").unwrap();
        let mut config = server_config(&ca);
        config.ca_pem = String::new();
        assert!(MtlsServer::new(&config).is_err());
    }

    #[test]
    fn mtls_server_debug_format() {
        let ca = EntwicklungsCa::erzeugen("Test-CA").unwrap();
        let server = MtlsServer::new(&server_config(&ca)).unwrap();
        assert!(format!("{:?}", server).contains("MtlsServer"));
    }
}
