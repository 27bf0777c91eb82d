//! Archiv-Worker: asynchrone Persistenz des Chat-Verlaufs
//!
//! Ein einzelner Task besitzt das `NachrichtenRepository` und arbeitet eine
//! begrenzte FIFO-Queue aus `Anhaengen`- und `Historie`-Auftraegen ab. Der
//! Raum reiht Auftraege nicht-blockierend ein, ein langsamer Speicher haelt
//! die Verteilung also nie auf.
//!
//! Weil Anhaengen und Historie-Abfragen durch dieselbe Queue laufen, enthaelt
//! eine Historie genau die Nachrichten, die vor ihr eingereiht wurden.

use std::sync::Arc;
use std::time::Duration;

use stammtisch_core::Nachricht;
use stammtisch_db::NachrichtenRepository;
use stammtisch_observability::{ChatMetriken, HealthState};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

/// Wiederholungsstrategie fuer fehlgeschlagenes Anhaengen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WiederholungsRichtlinie {
    /// Gesamtzahl der Versuche (mindestens 1)
    pub versuche: u32,
    pub start_verzoegerung: Duration,
    pub max_verzoegerung: Duration,
}

impl Default for WiederholungsRichtlinie {
    fn default() -> Self {
        Self {
            versuche: 3,
            start_verzoegerung: Duration::from_millis(100),
            max_verzoegerung: Duration::from_secs(2),
        }
    }
}

impl WiederholungsRichtlinie {
    /// Wartezeit nach dem fehlgeschlagenen Versuch `versuch` (0-basiert)
    ///
    /// Verdoppelt sich pro Versuch, gedeckelt auf `max_verzoegerung`.
    pub fn verzoegerung(&self, versuch: u32) -> Duration {
        let faktor = 2u32.saturating_pow(versuch);
        self.start_verzoegerung
            .saturating_mul(faktor)
            .min(self.max_verzoegerung)
    }
}

/// Auftrag an den Archiv-Worker
#[derive(Debug)]
pub enum ArchivAuftrag {
    Anhaengen(Nachricht),
    /// Liefert den gesamten Verlauf; bei Fehler einen leeren
    Historie(oneshot::Sender<Vec<Nachricht>>),
}

/// Sendeseite der Archiv-Queue
#[derive(Clone)]
pub struct ArchivHandle {
    tx: mpsc::Sender<ArchivAuftrag>,
    metriken: ChatMetriken,
}

impl ArchivHandle {
    /// Reiht eine Nachricht zum Speichern ein (fire-and-forget)
    ///
    /// Ist die Queue voll, wird die Nachricht verworfen und gezaehlt.
    pub fn anhaengen(&self, nachricht: Nachricht) {
        let from = nachricht.from.clone();
        match self.tx.try_send(ArchivAuftrag::Anhaengen(nachricht)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.metriken.archiv_verworfen_total.inc();
                tracing::warn!(%from, "Archiv-Queue voll, Nachricht wird nicht gespeichert");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!("Archiv-Worker beendet, Nachricht wird nicht gespeichert");
            }
        }
    }

    /// Reiht eine Historie-Anfrage ein
    ///
    /// Kann der Auftrag nicht eingereiht werden, wird `antwort` verworfen und
    /// der Empfaenger sieht einen leeren Verlauf.
    pub fn historie_anfordern(&self, antwort: oneshot::Sender<Vec<Nachricht>>) {
        match self.tx.try_send(ArchivAuftrag::Historie(antwort)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.metriken.archiv_verworfen_total.inc();
                tracing::warn!("Archiv-Queue voll, Historie wird nicht geliefert");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!("Archiv-Worker beendet, Historie wird nicht geliefert");
            }
        }
    }

    /// Fragt den Verlauf ab und wartet auf die Antwort
    #[cfg(test)]
    pub(crate) async fn historie(&self) -> Vec<Nachricht> {
        let (antwort_tx, antwort_rx) = oneshot::channel();
        if self.tx.send(ArchivAuftrag::Historie(antwort_tx)).await.is_err() {
            return Vec::new();
        }
        antwort_rx.await.unwrap_or_default()
    }
}

impl std::fmt::Debug for ArchivHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchivHandle")
            .field("geschlossen", &self.tx.is_closed())
            .finish()
    }
}

/// Archiv-Worker (Empfangsseite, besitzt das Repository)
pub struct Archiv<R: NachrichtenRepository> {
    repo: Arc<R>,
    rx: mpsc::Receiver<ArchivAuftrag>,
    richtlinie: WiederholungsRichtlinie,
    metriken: ChatMetriken,
    health: HealthState,
}

impl<R: NachrichtenRepository + 'static> Archiv<R> {
    /// Erstellt Worker und Handle mit einer Queue der Groesse `warteschlange`
    pub fn neu(
        repo: Arc<R>,
        warteschlange: usize,
        richtlinie: WiederholungsRichtlinie,
        metriken: ChatMetriken,
    ) -> (Self, ArchivHandle) {
        let (tx, rx) = mpsc::channel(warteschlange.max(1));
        let archiv = Self {
            repo,
            rx,
            richtlinie,
            metriken: metriken.clone(),
            health: HealthState::neu(),
        };
        (archiv, ArchivHandle { tx, metriken })
    }

    /// Meldet den Zustand des Speichers an `health`
    ///
    /// Ein endgueltiger Schreib- oder Lesefehler setzt die Datenbank auf
    /// nicht verbunden, der naechste Erfolg wieder auf verbunden.
    pub fn mit_health(mut self, health: HealthState) -> Self {
        self.health = health;
        self
    }

    /// Arbeitet die Queue ab bis alle Handles verworfen sind
    ///
    /// Bereits eingereihte Auftraege werden vor dem Ende noch erledigt.
    pub async fn ausfuehren(mut self) {
        tracing::debug!("Archiv-Worker gestartet");

        while let Some(auftrag) = self.rx.recv().await {
            match auftrag {
                ArchivAuftrag::Anhaengen(nachricht) => self.speichern(&nachricht).await,
                ArchivAuftrag::Historie(antwort) => {
                    let verlauf = self.laden().await;
                    // Empfaenger weg = Session schon beendet
                    let _ = antwort.send(verlauf);
                }
            }
        }

        tracing::debug!("Archiv-Worker beendet");
    }

    async fn speichern(&self, nachricht: &Nachricht) {
        let versuche = self.richtlinie.versuche.max(1);

        for versuch in 0..versuche {
            match self.repo.append(&nachricht.from, &nachricht.content).await {
                Ok(id) => {
                    self.health.db_status_setzen(true);
                    tracing::trace!(id, from = %nachricht.from, "Nachricht gespeichert");
                    return;
                }
                Err(e) if versuch + 1 < versuche => {
                    let warten = self.richtlinie.verzoegerung(versuch);
                    tracing::warn!(
                        fehler = %e,
                        versuch = versuch + 1,
                        warten_ms = warten.as_millis() as u64,
                        "Speichern fehlgeschlagen, neuer Versuch"
                    );
                    tokio::time::sleep(warten).await;
                }
                Err(e) => {
                    self.metriken.archiv_fehler_total.inc();
                    self.health.db_status_setzen(false);
                    tracing::error!(
                        fehler = %e,
                        from = %nachricht.from,
                        versuche,
                        "Nachricht konnte nicht gespeichert werden"
                    );
                }
            }
        }
    }

    async fn laden(&self) -> Vec<Nachricht> {
        match self.repo.fetch_all().await {
            Ok(records) => {
                self.health.db_status_setzen(true);
                records
                    .into_iter()
                    .map(|r| Nachricht::neu(r.from, r.content))
                    .collect()
            }
            Err(e) => {
                self.health.db_status_setzen(false);
                tracing::warn!(fehler = %e, "Historie konnte nicht geladen werden, sende leeren Verlauf");
                Vec::new()
            }
        }
    }
}
