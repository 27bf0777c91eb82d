//! Mitglieds-Identitaet aus dem verifizierten Client-Zertifikat
//!
//! Der Common Name (CN) des Leaf-Zertifikats wird zum Mitgliedsnamen.
//! Fehlt der CN, erhaelt das Mitglied den Namen `ANONYMES_MITGLIED`.

use rustls::pki_types::CertificateDer;
use stammtisch_core::Mitglied;

/// Fallback-Name wenn das Zertifikat keinen CN traegt
pub const ANONYMES_MITGLIED: &str = "anonym";

/// Extrahiert den ersten Common Name aus einem DER-kodierten Zertifikat
pub fn common_name(cert_der: &CertificateDer<'_>) -> Option<String> {
    let (_, cert) = x509_parser::parse_x509_certificate(cert_der.as_ref()).ok()?;
    let name = cert
        .subject()
        .iter_common_name()
        .find_map(|cn| cn.as_str().ok().map(str::to_string));
    name
}

/// Baut das Mitglied aus der Zertifikatskette des Peers
///
/// Erwartet die Kette wie von rustls geliefert (Leaf zuerst).
pub fn mitglied_aus_zertifikaten(kette: Option<&[CertificateDer<'_>]>) -> Mitglied {
    let name = kette
        .and_then(|k| k.first())
        .and_then(common_name)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| ANONYMES_MITGLIED.to_string());
    Mitglied::neu(name)
}
