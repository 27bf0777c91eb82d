//! Erzeugt eine Entwicklungs-PKI fuer lokale Tests
//!
//! Aufruf: `stammtisch-pki [ZIEL] [CLIENT...]`
//!
//! Schreibt CA, Server-Zertifikat (localhost, 127.0.0.1) und fuer jeden
//! angegebenen Namen ein Client-Zertifikat. Ohne Argumente wird `cert/`
//! mit einem Client `alice` befuellt.

use std::path::PathBuf;

use anyhow::{Context, Result};
use stammtisch_crypto::EntwicklungsCa;

const SERVER_HOSTS: &[&str] = &["localhost", "127.0.0.1"];

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let ziel = PathBuf::from(args.next().unwrap_or_else(|| "cert".into()));
    let mut clients: Vec<String> = args.collect();
    if clients.is_empty() {
        clients.push("alice".into());
    }

    let ca = EntwicklungsCa::erzeugen("Stammtisch Entwicklungs-CA")
        .context("CA konnte nicht erzeugt werden")?;
    let pfade = ca
        .in_verzeichnis_schreiben(&ziel, SERVER_HOSTS)
        .with_context(|| format!("Schreiben nach '{}' fehlgeschlagen", ziel.display()))?;

    println!("CA:       {}", pfade.ca_zertifikat.display());
    println!("Server:   {}", pfade.server_zertifikat.display());
    println!("          {}", pfade.server_schluessel.display());

    for name in &clients {
        let (zertifikat, schluessel) = ca
            .client_schreiben(&ziel, name)
            .with_context(|| format!("Client-Zertifikat fuer '{name}' fehlgeschlagen"))?;
        println!("Client:   {} ({})", zertifikat.display(), schluessel.display());
    }

    Ok(())
}
