//! Entwicklungs-PKI via rcgen
//!
//! Erzeugt eine eigene CA sowie davon signierte Server- und
//! Client-Zertifikate. Fuer Development und Tests; in Produktion stammen
//! die PEM-Dateien aus einer echten PKI.
//!
//! Verzeichnis-Layout von `in_verzeichnis_schreiben`:
//! ```text
//! <basis>/ca/ca-cert.pem
//! <basis>/serv/server-cert.pem
//! <basis>/serv/server-key.pem
//! <basis>/client/<name>-cert.pem
//! <basis>/client/<name>-key.pem
//! ```

use std::path::{Path, PathBuf};

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose,
};

use crate::error::{CryptoError, CryptoResult};
use crate::mtls::compute_certificate_fingerprint;

/// PEM-kodiertes Zertifikat mit zugehoerigem Schluessel
#[derive(Debug, Clone)]
pub struct ZertifikatPaar {
    pub zertifikat_pem: String,
    pub schluessel_pem: String,
    /// SHA-256 Fingerprint des Zertifikats
    pub fingerprint: String,
}

/// Pfade der geschriebenen Server-PKI
#[derive(Debug, Clone)]
pub struct PkiPfade {
    pub ca_zertifikat: PathBuf,
    pub server_zertifikat: PathBuf,
    pub server_schluessel: PathBuf,
}

/// Selbstsignierte Entwicklungs-CA
pub struct EntwicklungsCa {
    zertifikat: Certificate,
    schluessel: KeyPair,
    pem: String,
}

impl EntwicklungsCa {
    /// Erzeugt eine neue selbstsignierte CA
    pub fn erzeugen(name: &str) -> CryptoResult<Self> {
        let mut params = CertificateParams::new(Vec::<String>::new()).map_err(generierung)?;

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, name);
        dn.push(DnType::OrganizationName, "Stammtisch");
        params.distinguished_name = dn;

        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let schluessel = KeyPair::generate().map_err(generierung)?;
        let zertifikat = params.self_signed(&schluessel).map_err(generierung)?;
        let pem = zertifikat.pem();

        tracing::debug!(ca = name, "Entwicklungs-CA erzeugt");

        Ok(Self {
            zertifikat,
            schluessel,
            pem,
        })
    }

    /// PEM des CA-Zertifikats
    pub fn ca_pem(&self) -> &str {
        &self.pem
    }

    /// Stellt ein Server-Zertifikat fuer die angegebenen Hostnamen/IPs aus
    pub fn server_zertifikat(&self, hosts: &[&str]) -> CryptoResult<ZertifikatPaar> {
        let namen: Vec<String> = hosts.iter().map(|h| h.to_string()).collect();
        let mut params = CertificateParams::new(namen).map_err(generierung)?;

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, hosts.first().copied().unwrap_or("stammtisch"));
        params.distinguished_name = dn;
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

        self.signieren(params)
    }

    /// Stellt ein Client-Zertifikat aus; `name` wird zum Common Name
    pub fn client_zertifikat(&self, name: &str) -> CryptoResult<ZertifikatPaar> {
        let mut params = CertificateParams::new(Vec::<String>::new()).map_err(generierung)?;

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, name);
        params.distinguished_name = dn;
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];

        self.signieren(params)
    }

    /// Schreibt CA- und Server-Zertifikat nach `basis`
    pub fn in_verzeichnis_schreiben(&self, basis: &Path, hosts: &[&str]) -> CryptoResult<PkiPfade> {
        let server = self.server_zertifikat(hosts)?;

        let pfade = PkiPfade {
            ca_zertifikat: basis.join("ca").join("ca-cert.pem"),
            server_zertifikat: basis.join("serv").join("server-cert.pem"),
            server_schluessel: basis.join("serv").join("server-key.pem"),
        };

        pem_schreiben(&pfade.ca_zertifikat, &self.pem, false)?;
        pem_schreiben(&pfade.server_zertifikat, &server.zertifikat_pem, false)?;
        pem_schreiben(&pfade.server_schluessel, &server.schluessel_pem, true)?;

        tracing::info!(
            verzeichnis = %basis.display(),
            fingerprint = %server.fingerprint,
            "Server-PKI geschrieben"
        );
        Ok(pfade)
    }

    /// Stellt ein Client-Zertifikat aus und schreibt es nach `<basis>/client/`
    ///
    /// Gibt die Pfade (Zertifikat, Schluessel) zurueck.
    pub fn client_schreiben(&self, basis: &Path, name: &str) -> CryptoResult<(PathBuf, PathBuf)> {
        let paar = self.client_zertifikat(name)?;
        let zertifikat = basis.join("client").join(format!("{name}-cert.pem"));
        let schluessel = basis.join("client").join(format!("{name}-key.pem"));

        pem_schreiben(&zertifikat, &paar.zertifikat_pem, false)?;
        pem_schreiben(&schluessel, &paar.schluessel_pem, true)?;

        tracing::info!(client = name, fingerprint = %paar.fingerprint, "Client-Zertifikat geschrieben");
        Ok((zertifikat, schluessel))
    }

    fn signieren(&self, params: CertificateParams) -> CryptoResult<ZertifikatPaar> {
        let schluessel = KeyPair::generate().map_err(generierung)?;
        let zertifikat = params
            .signed_by(&schluessel, &self.zertifikat, &self.schluessel)
            .map_err(generierung)?;

        Ok(ZertifikatPaar {
            fingerprint: compute_certificate_fingerprint(zertifikat.der().as_ref()),
            zertifikat_pem: zertifikat.pem(),
            schluessel_pem: schluessel.serialize_pem(),
        })
    }
}

impl std::fmt::Debug for EntwicklungsCa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntwicklungsCa").finish_non_exhaustive()
    }
}

fn generierung(e: rcgen::Error) -> CryptoError {
    CryptoError::ZertifikatGenerierung(e.to_string())
}

fn pem_schreiben(pfad: &Path, inhalt: &str, geheim: bool) -> CryptoResult<()> {
    if let Some(eltern) = pfad.parent() {
        std::fs::create_dir_all(eltern).map_err(|e| CryptoError::datei(eltern, e))?;
    }
    std::fs::write(pfad, inhalt.as_bytes()).map_err(|e| CryptoError::datei(pfad, e))?;

    #[cfg(unix)]
    if geheim {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(pfad, std::fs::Permissions::from_mode(0o600)) {
            tracing::warn!(pfad = %pfad.display(), fehler = %e, "Schluesselrechte nicht gesetzt");
        }
    }
    #[cfg(not(unix))]
    let _ = geheim;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
