//! Unit-Tests fuer Raum, Session und Archiv

mod archiv_tests;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stammtisch_core::{Mitglied, Nachricht, SessionId};
use stammtisch_db::{DbError, DbResult, NachrichtRecord, NachrichtenRepository};
use stammtisch_observability::ChatMetriken;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::archiv::{Archiv, ArchivHandle, WiederholungsRichtlinie};
use crate::room::{Room, RoomHandle, SessionHandle};

/// In-Memory-Repository mit einstellbaren Fehlern
#[derive(Default)]
pub(crate) struct TestRepo {
    nachrichten: Mutex<Vec<NachrichtRecord>>,
    /// So viele der naechsten append-Aufrufe schlagen fehl
    append_fehler: AtomicU32,
    fetch_fehler: AtomicBool,
    append_aufrufe: AtomicU32,
}

impl TestRepo {
    pub(crate) fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn append_fehlschlagen(&self, anzahl: u32) {
        self.append_fehler.store(anzahl, Ordering::SeqCst);
    }

    pub(crate) fn fetch_fehlschlagen(&self) {
        self.fetch_fehler.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fetch_reparieren(&self) {
        self.fetch_fehler.store(false, Ordering::SeqCst);
    }

    pub(crate) fn append_aufrufe(&self) -> u32 {
        self.append_aufrufe.load(Ordering::SeqCst)
    }

    pub(crate) fn gespeichert(&self) -> Vec<(String, String)> {
        self.nachrichten
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.from.clone(), r.content.clone()))
            .collect()
    }
}

#[async_trait]
impl NachrichtenRepository for TestRepo {
    async fn append(&self, from: &str, content: &str) -> DbResult<i64> {
        self.append_aufrufe.fetch_add(1, Ordering::SeqCst);

        let fehler = self
            .append_fehler
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if fehler.is_ok() {
            return Err(DbError::intern("append fehlgeschlagen"));
        }

        let mut nachrichten = self.nachrichten.lock().unwrap();
        let id = nachrichten.len() as i64 + 1;
        nachrichten.push(NachrichtRecord {
            id,
            from: from.to_string(),
            content: content.to_string(),
        });
        Ok(id)
    }

    async fn fetch_all(&self) -> DbResult<Vec<NachrichtRecord>> {
        if self.fetch_fehler.load(Ordering::SeqCst) {
            return Err(DbError::intern("fetch fehlgeschlagen"));
        }
        Ok(self.nachrichten.lock().unwrap().clone())
    }
}

/// Laufender Raum mit Archiv fuer Tests
pub(crate) struct TestRaum {
    pub raum: RoomHandle,
    pub archiv: ArchivHandle,
    pub metriken: ChatMetriken,
    pub shutdown: CancellationToken,
    pub room_task: JoinHandle<()>,
}

pub(crate) fn raum_starten(repo: Arc<TestRepo>) -> TestRaum {
    let metriken = ChatMetriken::neu().unwrap();
    let shutdown = CancellationToken::new();

    let (archiv, archiv_handle) = Archiv::neu(
        repo,
        64,
        WiederholungsRichtlinie::default(),
        metriken.clone(),
    );
    tokio::spawn(archiv.ausfuehren());

    let (room, raum) = Room::neu(
        "Chat",
        64,
        archiv_handle.clone(),
        metriken.clone(),
        shutdown.clone(),
    );
    let room_task = tokio::spawn(room.ausfuehren());

    TestRaum {
        raum,
        archiv: archiv_handle,
        metriken,
        shutdown,
        room_task,
    }
}

/// SessionHandle mit eigenem Postfach (ohne echte Verbindung)
pub(crate) fn test_session(
    name: &str,
    kapazitaet: usize,
) -> (SessionHandle, mpsc::Receiver<Nachricht>) {
    let (tx, rx) = mpsc::channel(kapazitaet);
    let handle = SessionHandle {
        id: SessionId::new(),
        mitglied: Mitglied::neu(name),
        postfach: tx,
    };
    (handle, rx)
}
