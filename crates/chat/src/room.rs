//! Raum-Koordinator (Hub)
//!
//! Der Raum ist der einzige Schreiber seiner Mitgliederliste. Alle
//! Aenderungen laufen als `RaumBefehl` durch ein einziges begrenztes
//! Postfach und werden nacheinander verarbeitet; Join, Leave und Broadcast
//! sind dadurch total geordnet, ohne Mutex.
//!
//! Verteilung ist nicht-blockierend: ist das Postfach eines Mitglieds voll,
//! wird das Mitglied verdraengt statt den Rest des Raums aufzuhalten.

use std::collections::HashMap;

use stammtisch_core::{Mitglied, Nachricht, SessionId};
use stammtisch_observability::ChatMetriken;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::archiv::ArchivHandle;
use crate::error::{ChatError, ChatResult};

/// Standardgroesse des Raum-Postfachs
pub const STANDARD_RAUM_WARTESCHLANGE: usize = 256;

/// Sicht des Raums auf eine Session
///
/// `postfach` ist der einzige Sender des Session-Postfachs. Entfernt der
/// Raum das Mitglied, wird das Postfach damit geschlossen.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: SessionId,
    pub mitglied: Mitglied,
    pub postfach: mpsc::Sender<Nachricht>,
}

/// Eintrag im Mitglieder-Schnappschuss
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaumMitglied {
    pub id: SessionId,
    pub mitglied: Mitglied,
}

/// Befehle an den Raum-Koordinator
#[derive(Debug)]
pub enum RaumBefehl {
    /// Nimmt die Session auf; der Verlauf vor dem Beitritt wird an `historie` geliefert
    Join {
        session: SessionHandle,
        historie: oneshot::Sender<Vec<Nachricht>>,
    },
    Leave(SessionId),
    Broadcast(Nachricht),
    /// Schnappschuss der aktuellen Mitglieder (nur lesend)
    Mitglieder(oneshot::Sender<Vec<RaumMitglied>>),
}

/// Sendeseite des Raum-Postfachs
#[derive(Debug, Clone)]
pub struct RoomHandle {
    name: String,
    tx: mpsc::Sender<RaumBefehl>,
}

impl RoomHandle {
    /// Handle auf ein beliebiges Befehls-Postfach (fuer Tests ohne Koordinator)
    #[cfg(test)]
    pub(crate) fn aus_sender(name: impl Into<String>, tx: mpsc::Sender<RaumBefehl>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gibt true zurueck wenn der Koordinator beendet ist
    #[cfg(test)]
    pub(crate) fn ist_geschlossen(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn join(
        &self,
        session: SessionHandle,
        historie: oneshot::Sender<Vec<Nachricht>>,
    ) -> ChatResult<()> {
        self.senden(RaumBefehl::Join { session, historie }).await
    }

    pub async fn leave(&self, id: SessionId) -> ChatResult<()> {
        self.senden(RaumBefehl::Leave(id)).await
    }

    pub async fn broadcast(&self, nachricht: Nachricht) -> ChatResult<()> {
        self.senden(RaumBefehl::Broadcast(nachricht)).await
    }

    /// Aktuelle Mitglieder, in der Reihenfolge des Koordinators verarbeitet
    pub async fn mitglieder(&self) -> ChatResult<Vec<RaumMitglied>> {
        let (tx, rx) = oneshot::channel();
        self.senden(RaumBefehl::Mitglieder(tx)).await?;
        rx.await
            .map_err(|_| ChatError::RaumGeschlossen(self.name.clone()))
    }

    async fn senden(&self, befehl: RaumBefehl) -> ChatResult<()> {
        self.tx
            .send(befehl)
            .await
            .map_err(|_| ChatError::RaumGeschlossen(self.name.clone()))
    }
}

/// Raum-Koordinator
pub struct Room {
    name: String,
    mitglieder: HashMap<SessionId, SessionHandle>,
    rx: mpsc::Receiver<RaumBefehl>,
    archiv: ArchivHandle,
    metriken: ChatMetriken,
    shutdown: CancellationToken,
}

impl Room {
    /// Erstellt einen leeren Raum und das zugehoerige Handle
    pub fn neu(
        name: impl Into<String>,
        warteschlange: usize,
        archiv: ArchivHandle,
        metriken: ChatMetriken,
        shutdown: CancellationToken,
    ) -> (Self, RoomHandle) {
        let name = name.into();
        let (tx, rx) = mpsc::channel(warteschlange.max(1));
        let room = Self {
            name: name.clone(),
            mitglieder: HashMap::new(),
            rx,
            archiv,
            metriken,
            shutdown,
        };
        (room, RoomHandle { name, tx })
    }

    /// Koordinator-Schleife
    ///
    /// Endet bei Abbruch oder wenn alle Handles verworfen sind. Danach sind
    /// alle Mitglieder entfernt und ihre Postfaecher geschlossen.
    pub async fn ausfuehren(mut self) {
        tracing::info!(raum = %self.name, "Raum geoeffnet");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                befehl = self.rx.recv() => match befehl {
                    Some(befehl) => self.verarbeiten(befehl),
                    None => break,
                },
            }
        }

        self.schliessen();
    }

    /// Verarbeitet genau einen Befehl
    fn verarbeiten(&mut self, befehl: RaumBefehl) {
        match befehl {
            RaumBefehl::Join { session, historie } => self.aufnehmen(session, historie),
            RaumBefehl::Leave(id) => self.entfernen(id),
            RaumBefehl::Broadcast(nachricht) => self.verteilen(nachricht),
            RaumBefehl::Mitglieder(antwort) => {
                let liste = self
                    .mitglieder
                    .values()
                    .map(|s| RaumMitglied {
                        id: s.id,
                        mitglied: s.mitglied.clone(),
                    })
                    .collect();
                let _ = antwort.send(liste);
            }
        }
    }

    fn aufnehmen(&mut self, session: SessionHandle, historie: oneshot::Sender<Vec<Nachricht>>) {
        if self.mitglieder.contains_key(&session.id) {
            tracing::debug!(raum = %self.name, session = %session.id, "Session ist bereits Mitglied");
            return;
        }

        tracing::info!(
            raum = %self.name,
            session = %session.id,
            mitglied = %session.mitglied.name,
            "Mitglied beigetreten"
        );
        self.mitglieder.insert(session.id, session);
        self.metriken.raum_mitglieder.set(self.mitglieder.len() as i64);

        // Direkt hinter allen bisherigen Anhaengen-Auftraegen einreihen
        self.archiv.historie_anfordern(historie);
    }

    fn entfernen(&mut self, id: SessionId) {
        if let Some(session) = self.mitglieder.remove(&id) {
            tracing::info!(
                raum = %self.name,
                session = %id,
                mitglied = %session.mitglied.name,
                "Mitglied hat den Raum verlassen"
            );
            self.metriken.raum_mitglieder.set(self.mitglieder.len() as i64);
        }
    }

    fn verteilen(&mut self, nachricht: Nachricht) {
        let mut entfernen = Vec::new();

        for (id, session) in &self.mitglieder {
            match session.postfach.try_send(nachricht.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.metriken.verdraengungen_total.inc();
                    tracing::warn!(
                        raum = %self.name,
                        session = %id,
                        mitglied = %session.mitglied.name,
                        "Postfach voll, Mitglied wird verdraengt"
                    );
                    entfernen.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(raum = %self.name, session = %id, "Postfach bereits geschlossen");
                    entfernen.push(*id);
                }
            }
        }

        for id in entfernen {
            self.mitglieder.remove(&id);
        }

        self.metriken.nachrichten_total.inc();
        self.metriken.raum_mitglieder.set(self.mitglieder.len() as i64);
        self.archiv.anhaengen(nachricht);
    }

    fn schliessen(&mut self) {
        let anzahl = self.mitglieder.len();
        self.mitglieder.clear();
        self.metriken.raum_mitglieder.set(0);
        tracing::info!(raum = %self.name, mitglieder = anzahl, "Raum geschlossen");
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("name", &self.name)
            .field("mitglieder", &self.mitglieder.len())
            .finish()
    }
}
