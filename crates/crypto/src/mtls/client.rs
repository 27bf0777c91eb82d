//! mTLS-Client (TLS-Connector mit Client-Zertifikat)
//!
//! Wird von Integrationstests und Werkzeugen genutzt, um sich wie ein
//! echter Chat-Client mit dem Server zu verbinden.

use std::sync::Arc;

use rustls::ClientConfig;
use tokio_rustls::TlsConnector;

use crate::error::{CryptoError, CryptoResult};
use crate::mtls::config::{
    crypto_provider, parse_certificates, parse_private_key, root_store, MtlsClientConfig,
};

/// mTLS-Client
pub struct MtlsClient {
    pub connector: TlsConnector,
}

impl MtlsClient {
    /// Erstellt einen neuen mTLS-Client
    pub fn new(config: &MtlsClientConfig) -> CryptoResult<Self> {
        let roots = root_store(&config.ca_pem)?;
        let builder = ClientConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()
            .map_err(|e| CryptoError::Tls(e.to_string()))?
            .with_root_certificates(roots);

        let tls_config = match (&config.zertifikat_pem, &config.schluessel_pem) {
            (Some(zertifikat), Some(schluessel)) => builder
                .with_client_auth_cert(parse_certificates(zertifikat)?, parse_private_key(schluessel)?)
                .map_err(|e| CryptoError::Tls(e.to_string()))?,
            _ => builder.with_no_client_auth(),
        };

        Ok(Self {
            connector: TlsConnector::from(Arc::new(tls_config)),
        })
    }
}

impl std::fmt::Debug for MtlsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MtlsClient").finish()
    }
}
