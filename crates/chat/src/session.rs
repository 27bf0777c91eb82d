//! Session-Aktor: eine WebSocket-Verbindung im Raum
//!
//! Jede Session betreibt zwei Tasks in einem eigenen `JoinSet`:
//! - Eingang: liest Frames und schickt sie als Broadcast an den Raum
//! - Ausgang: schreibt zuerst den Verlauf, dann das Postfach auf die Verbindung.
//!   Bis der Verlauf da ist, wird das Postfach lokal gepuffert.
//!
//! Der Abbau ist ueber `SessionZustand` abgesichert: nur der Uebergang
//! `Aktiv -> Schliessend` sendet Leave und bricht die Session ab, egal ob
//! Eingang, Ausgang oder ein externer Abbruch zuerst da ist.
//! `Geschlossen` wird genau einmal gesetzt, nachdem beide Tasks beendet sind.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use stammtisch_core::{Mitglied, Nachricht, SessionId, SessionZustand};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use crate::error::{ChatError, ChatResult};
use crate::room::{RoomHandle, SessionHandle};

/// Einstellungen pro Session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptionen {
    /// Kapazitaet des ausgehenden Postfachs; ein volles Postfach fuehrt zur Verdraengung
    pub postfach_kapazitaet: usize,
    /// Obergrenze fuer das Senden des Close-Frames beim Abbau
    pub schliessen_timeout: Duration,
    /// Wartezeit auf den Verlauf; danach startet die Session ohne Verlauf
    pub historie_timeout: Duration,
}

impl Default for SessionOptionen {
    fn default() -> Self {
        Self {
            postfach_kapazitaet: 1,
            schliessen_timeout: Duration::from_secs(1),
            historie_timeout: Duration::from_secs(5),
        }
    }
}

/// Eine Client-Session
pub struct Session<S> {
    id: SessionId,
    mitglied: Mitglied,
    ws: WebSocketStream<S>,
    raum: RoomHandle,
    optionen: SessionOptionen,
    token: CancellationToken,
    zustand: watch::Sender<SessionZustand>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Erstellt eine Session fuer eine bereits aufgebaute WebSocket-Verbindung
    ///
    /// `token` bricht die Session ab; ueblicherweise ein Child des Server-Tokens.
    pub fn neu(
        mitglied: Mitglied,
        ws: WebSocketStream<S>,
        raum: RoomHandle,
        optionen: SessionOptionen,
        token: CancellationToken,
    ) -> Self {
        let (zustand, _) = watch::channel(SessionZustand::Aktiv);
        Self {
            id: SessionId::new(),
            mitglied,
            ws,
            raum,
            optionen,
            token,
            zustand,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Lebenszyklus-Signal; wechselt genau einmal auf `Geschlossen`
    pub fn lebenszyklus(&self) -> watch::Receiver<SessionZustand> {
        self.zustand.subscribe()
    }

    /// Tritt dem Raum bei und betreibt die Session bis zum Abbau
    pub async fn ausfuehren(self) {
        let Session {
            id,
            mitglied,
            mut ws,
            raum,
            optionen,
            token,
            zustand,
        } = self;

        let abbau = Arc::new(Abbau {
            id,
            raum,
            zustand,
            token,
        });

        let (postfach_tx, postfach_rx) = mpsc::channel(optionen.postfach_kapazitaet.max(1));
        let (historie_tx, historie_rx) = oneshot::channel();
        let handle = SessionHandle {
            id,
            mitglied: mitglied.clone(),
            postfach: postfach_tx,
        };

        let beigetreten = tokio::select! {
            biased;
            _ = abbau.token.cancelled() => Err(ChatError::Abgebrochen),
            ergebnis = abbau.raum.join(handle, historie_tx) => ergebnis,
        };

        if let Err(e) = beigetreten {
            tracing::warn!(session = %id, mitglied = %mitglied.name, fehler = %e, "Beitritt fehlgeschlagen");
            abbau.einleiten("beitritt fehlgeschlagen").await;
            let _ = tokio::time::timeout(optionen.schliessen_timeout, ws.close(None)).await;
            abbau.abschliessen();
            return;
        }

        tracing::info!(session = %id, mitglied = %mitglied.name, raum = %abbau.raum.name(), "Session gestartet");

        let (sink, stream) = ws.split();
        let mut aufgaben = JoinSet::new();
        aufgaben.spawn(eingang(stream, mitglied, abbau.clone()));
        aufgaben.spawn(ausgang(
            sink,
            postfach_rx,
            historie_rx,
            abbau.clone(),
            optionen,
        ));

        while let Some(ergebnis) = aufgaben.join_next().await {
            if let Err(e) = ergebnis {
                tracing::error!(session = %id, fehler = %e, "Session-Task abgebrochen");
                abbau.einleiten("task-fehler").await;
            }
        }

        abbau.abschliessen();
        tracing::info!(session = %id, "Session beendet");
    }
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("mitglied", &self.mitglied.name)
            .field("zustand", &*self.zustand.borrow())
            .finish()
    }
}

/// Gemeinsamer Abbau-Zustand beider Tasks
struct Abbau {
    id: SessionId,
    raum: RoomHandle,
    zustand: watch::Sender<SessionZustand>,
    token: CancellationToken,
}

impl Abbau {
    /// Leitet den Abbau ein; nur der erste Aufruf hat eine Wirkung
    ///
    /// Gibt true zurueck wenn dieser Aufruf den Abbau ausgeloest hat.
    async fn einleiten(&self, grund: &str) -> bool {
        let gewonnen = self.zustand.send_if_modified(|zustand| {
            if *zustand == SessionZustand::Aktiv {
                *zustand = SessionZustand::Schliessend;
                true
            } else {
                false
            }
        });

        if !gewonnen {
            return false;
        }

        tracing::debug!(session = %self.id, grund, "Abbau eingeleitet");
        self.token.cancel();

        if let Err(e) = self.raum.leave(self.id).await {
            tracing::debug!(session = %self.id, fehler = %e, "Leave nicht zugestellt");
        }
        true
    }

    fn abschliessen(&self) {
        self.zustand.send_replace(SessionZustand::Geschlossen);
    }
}

async fn eingang<S>(mut stream: SplitStream<WebSocketStream<S>>, mitglied: Mitglied, abbau: Arc<Abbau>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let grund = empfangen(&mut stream, &mitglied, &abbau).await;
    abbau.einleiten(grund).await;
}

async fn empfangen<S>(
    stream: &mut SplitStream<WebSocketStream<S>>,
    mitglied: &Mitglied,
    abbau: &Abbau,
) -> &'static str
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = abbau.token.cancelled() => return "abgebrochen",
            frame = stream.next() => frame,
        };

        let content = match frame {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(daten))) => String::from_utf8_lossy(&daten).into_owned(),
            Some(Ok(Message::Close(_))) | None => return "verbindung geschlossen",
            // Ping/Pong beantwortet tungstenite selbst
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::debug!(session = %abbau.id, fehler = %e, "Lesefehler");
                return "lesefehler";
            }
        };

        let gesendet = tokio::select! {
            biased;
            _ = abbau.token.cancelled() => return "abgebrochen",
            ergebnis = abbau.raum.broadcast(mitglied.nachricht(content)) => ergebnis,
        };
        if gesendet.is_err() {
            return "raum geschlossen";
        }
    }
}

async fn ausgang<S>(
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut postfach: mpsc::Receiver<Nachricht>,
    historie: oneshot::Receiver<Vec<Nachricht>>,
    abbau: Arc<Abbau>,
    optionen: SessionOptionen,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let grund = match verlauf_abwarten(&mut postfach, historie, optionen.historie_timeout, &abbau).await {
        Ok((verlauf, puffer)) => zustellen(&mut sink, &mut postfach, verlauf, puffer, &abbau).await,
        Err(grund) => grund,
    };
    abbau.einleiten(grund).await;

    match tokio::time::timeout(optionen.schliessen_timeout, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::trace!(session = %abbau.id, fehler = %e, "Close-Frame nicht gesendet"),
        Err(_) => tracing::debug!(session = %abbau.id, "Timeout beim Schliessen der Verbindung"),
    }
}

/// Wartet auf den Verlauf und leert dabei das Postfach in einen lokalen Puffer
///
/// Ein langsamer Speicher darf nicht zur Verdraengung fuehren. Nach `frist`
/// oder bei verworfener Antwort gilt der Verlauf als leer.
async fn verlauf_abwarten(
    postfach: &mut mpsc::Receiver<Nachricht>,
    mut historie: oneshot::Receiver<Vec<Nachricht>>,
    frist: Duration,
    abbau: &Abbau,
) -> Result<(Vec<Nachricht>, VecDeque<Nachricht>), &'static str> {
    let mut puffer = VecDeque::new();
    let ablauf = tokio::time::sleep(frist);
    tokio::pin!(ablauf);

    loop {
        tokio::select! {
            biased;
            _ = abbau.token.cancelled() => return Err("abgebrochen"),
            verlauf = &mut historie => return Ok((verlauf.unwrap_or_default(), puffer)),
            nachricht = postfach.recv() => match nachricht {
                Some(nachricht) => puffer.push_back(nachricht),
                None => return Err("postfach geschlossen"),
            },
            _ = &mut ablauf => {
                tracing::warn!(
                    session = %abbau.id,
                    gepuffert = puffer.len(),
                    "Verlauf nicht rechtzeitig geladen, Session startet ohne Verlauf"
                );
                return Ok((Vec::new(), puffer));
            }
        }
    }
}

/// Schreibt den Verlauf, dann gepufferte und zuletzt laufende Live-Nachrichten
async fn zustellen<S>(
    sink: &mut SplitSink<WebSocketStream<S>, Message>,
    postfach: &mut mpsc::Receiver<Nachricht>,
    verlauf: Vec<Nachricht>,
    puffer: VecDeque<Nachricht>,
    abbau: &Abbau,
) -> &'static str
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let anzahl = verlauf.len();
    for nachricht in verlauf.iter().chain(puffer.iter()) {
        if let Err(e) = schreiben(sink, nachricht, &abbau.token).await {
            return schreib_grund(abbau.id, e);
        }
    }
    tracing::debug!(session = %abbau.id, anzahl, gepuffert = puffer.len(), "Verlauf zugestellt");

    loop {
        let nachricht = tokio::select! {
            biased;
            _ = abbau.token.cancelled() => return "abgebrochen",
            nachricht = postfach.recv() => nachricht,
        };

        // Raum hat das Postfach geschlossen (Leave oder Verdraengung)
        let Some(nachricht) = nachricht else {
            return "postfach geschlossen";
        };

        if let Err(e) = schreiben(sink, &nachricht, &abbau.token).await {
            return schreib_grund(abbau.id, e);
        }
    }
}

async fn schreiben<S>(
    sink: &mut SplitSink<WebSocketStream<S>, Message>,
    nachricht: &Nachricht,
    token: &CancellationToken,
) -> ChatResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let text = nachricht.als_json()?;
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ChatError::Abgebrochen),
        ergebnis = sink.send(Message::text(text)) => ergebnis.map_err(ChatError::from),
    }
}

fn schreib_grund(id: SessionId, fehler: ChatError) -> &'static str {
    match fehler {
        ChatError::Abgebrochen => "abgebrochen",
        e => {
            tracing::debug!(session = %id, fehler = %e, "Schreibfehler");
            "schreibfehler"
        }
    }
}
