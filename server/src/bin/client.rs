//! Chat-Client fuer die Kommandozeile
//!
//! Aufruf: `stammtisch-client [ADRESSE] [NAME] [ZERTIFIKATE]`
//!
//! Standard: `localhost:8080`, Client `zst`, Zertifikate aus `cert/`
//! (wie von `stammtisch-pki` erzeugt). Jede Zeile auf stdin wird gesendet,
//! empfangene Nachrichten erscheinen auf stdout. Ctrl-C beendet die
//! Verbindung mit einem normalen Close-Frame.

use std::path::PathBuf;

use anyhow::Result;
use stammtisch_observability::logging_initialisieren;
use stammtisch_server::client::{self, ClientConfig};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> Result<()> {
    logging_initialisieren("info", "text");

    let mut args = std::env::args().skip(1);
    let adresse = args.next().unwrap_or_else(|| "localhost:8080".into());
    let name = args.next().unwrap_or_else(|| "zst".into());
    let basis = PathBuf::from(args.next().unwrap_or_else(|| "cert".into()));

    let config = ClientConfig::aus_verzeichnis(adresse, &basis, &name);
    let ws = client::verbinden(&config).await?;

    let stopp = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(fehler = %e, "Ctrl-C-Handler nicht installierbar");
            std::future::pending::<()>().await;
        }
    };

    client::ausfuehren(ws, BufReader::new(tokio::io::stdin()), tokio::io::stdout(), stopp).await
}
