//! Kommandozeilen-Client fuer den Chat-Raum
//!
//! Verbindet sich per mTLS und WebSocket mit dem Server, schickt jede
//! Eingabezeile als Nachricht und gibt empfangene Nachrichten als
//! `name: text` aus. Beim Stopp wird ein normaler Close-Frame gesendet und
//! hoechstens `SCHLIESSEN_TIMEOUT` auf die Antwort des Servers gewartet.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use rustls::pki_types::ServerName;
use stammtisch_core::Nachricht;
use stammtisch_crypto::{MtlsClient, MtlsClientConfig};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;

/// Wartezeit auf den Close-Frame des Servers
pub const SCHLIESSEN_TIMEOUT: Duration = Duration::from_secs(1);

/// Aufgebaute Verbindung zum Server
pub type ClientVerbindung = WebSocketStream<tokio_rustls::client::TlsStream<TcpStream>>;

/// Verbindungsdaten des Clients
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port` des Servers
    pub adresse: String,
    pub ca_zertifikat: PathBuf,
    pub zertifikat: PathBuf,
    pub schluessel: PathBuf,
}

impl ClientConfig {
    /// Erwartet die Ablage von `stammtisch-pki`: `ca/ca-cert.pem` und
    /// `client/<name>-cert.pem` / `client/<name>-key.pem`
    pub fn aus_verzeichnis(adresse: impl Into<String>, basis: &Path, name: &str) -> Self {
        Self {
            adresse: adresse.into(),
            ca_zertifikat: basis.join("ca").join("ca-cert.pem"),
            zertifikat: basis.join("client").join(format!("{name}-cert.pem")),
            schluessel: basis.join("client").join(format!("{name}-key.pem")),
        }
    }

    /// Hostname fuer die Pruefung des Server-Zertifikats
    pub fn server_name(&self) -> &str {
        self.adresse
            .rsplit_once(':')
            .map_or(self.adresse.as_str(), |(host, _)| host)
    }

    fn mtls(&self) -> Result<MtlsClientConfig> {
        let lesen = |pfad: &Path| {
            std::fs::read_to_string(pfad)
                .with_context(|| format!("'{}' nicht lesbar", pfad.display()))
        };
        Ok(MtlsClientConfig::neu(
            lesen(&self.ca_zertifikat)?,
            lesen(&self.zertifikat)?,
            lesen(&self.schluessel)?,
        ))
    }
}

/// Baut TCP, mTLS und WebSocket auf
pub async fn verbinden(config: &ClientConfig) -> Result<ClientVerbindung> {
    let client = MtlsClient::new(&config.mtls()?).context("TLS-Konfiguration ungueltig")?;
    let server_name = ServerName::try_from(config.server_name().to_string())
        .with_context(|| format!("Ungueltiger Servername '{}'", config.server_name()))?;

    let tcp = TcpStream::connect(&config.adresse)
        .await
        .with_context(|| format!("Verbindung zu {} fehlgeschlagen", config.adresse))?;
    let tls = client
        .connector
        .connect(server_name, tcp)
        .await
        .context("TLS-Handshake fehlgeschlagen")?;
    let url = format!("wss://{}/", config.adresse);
    let (ws, _) = tokio_tungstenite::client_async(url, tls)
        .await
        .context("WebSocket-Upgrade fehlgeschlagen")?;

    tracing::info!(adresse = %config.adresse, "Verbunden");
    Ok(ws)
}

/// Betreibt die Verbindung bis `stopp`, Ende der Eingabe oder Serverende
pub async fn ausfuehren<E, A>(
    ws: ClientVerbindung,
    eingabe: E,
    mut ausgabe: A,
    stopp: impl Future<Output = ()>,
) -> Result<()>
where
    E: AsyncBufRead + Unpin,
    A: AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = ws.split();
    let mut zeilen = eingabe.lines();
    tokio::pin!(stopp);

    loop {
        tokio::select! {
            _ = &mut stopp => {
                tracing::info!("Unterbrochen");
                break;
            }
            zeile = zeilen.next_line() => match zeile.context("Eingabe nicht lesbar")? {
                Some(zeile) => sink.send(Message::text(zeile)).await.context("Senden fehlgeschlagen")?,
                None => break,
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => anzeigen(&mut ausgabe, &text).await?,
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("Server hat die Verbindung geschlossen");
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("Lesefehler"),
            },
        }
    }

    let abschied = CloseFrame {
        code: CloseCode::Normal,
        reason: Utf8Bytes::from_static(""),
    };
    if let Err(e) = sink.send(Message::Close(Some(abschied))).await {
        tracing::debug!(fehler = %e, "Close-Frame nicht gesendet");
        return Ok(());
    }

    // Restliche Nachrichten bis zum Close des Servers noch ausgeben
    let rest = tokio::time::timeout(SCHLIESSEN_TIMEOUT, async {
        while let Some(Ok(frame)) = stream.next().await {
            if let Message::Text(text) = frame {
                anzeigen(&mut ausgabe, &text).await?;
            }
        }
        Ok::<_, anyhow::Error>(())
    })
    .await;
    match rest {
        Ok(ergebnis) => ergebnis,
        Err(_) => {
            tracing::debug!("Server hat den Close-Frame nicht rechtzeitig beantwortet");
            Ok(())
        }
    }
}

async fn anzeigen<A: AsyncWrite + Unpin>(ausgabe: &mut A, text: &Utf8Bytes) -> Result<()> {
    let zeile = match serde_json::from_str::<Nachricht>(text.as_str()) {
        Ok(nachricht) => format!("{}: {}\n", nachricht.from, nachricht.content),
        Err(_) => format!("{}\n", text.as_str()),
    };
    ausgabe.write_all(zeile.as_bytes()).await?;
    ausgabe.flush().await?;
    Ok(())
}
