//! Tests fuer den Archiv-Worker

use std::sync::Arc;
use std::time::Duration;

use stammtisch_core::Nachricht;
use stammtisch_db::SqliteDb;
use stammtisch_observability::{ChatMetriken, HealthState, HealthStatus};
use tokio::sync::oneshot;

use super::TestRepo;
use crate::archiv::{Archiv, WiederholungsRichtlinie};

fn richtlinie(versuche: u32) -> WiederholungsRichtlinie {
    WiederholungsRichtlinie {
        versuche,
        start_verzoegerung: Duration::from_millis(50),
        max_verzoegerung: Duration::from_millis(200),
    }
}

#[tokio::test]
async fn test_anhaengen_und_historie_in_reihenfolge() {
    let repo = TestRepo::neu();
    let (archiv, handle) = Archiv::neu(repo.clone(), 16, richtlinie(1), ChatMetriken::neu().unwrap());
    tokio::spawn(archiv.ausfuehren());

    handle.anhaengen(Nachricht::neu("A", "eins"));
    handle.anhaengen(Nachricht::neu("B", "zwei"));
    handle.anhaengen(Nachricht::neu("A", "drei"));

    let verlauf = handle.historie().await;
    let inhalte: Vec<&str> = verlauf.iter().map(|n| n.content.as_str()).collect();
    assert_eq!(inhalte, vec!["eins", "zwei", "drei"]);
    assert_eq!(verlauf[1].from, "B");
}

#[tokio::test]
async fn test_fetch_fehler_liefert_leeren_verlauf() {
    let repo = TestRepo::neu();
    let (archiv, handle) = Archiv::neu(repo.clone(), 16, richtlinie(1), ChatMetriken::neu().unwrap());
    tokio::spawn(archiv.ausfuehren());

    handle.anhaengen(Nachricht::neu("A", "hi"));
    repo.fetch_fehlschlagen();

    assert!(handle.historie().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_anhaengen_wird_wiederholt() {
    let repo = TestRepo::neu();
    repo.append_fehlschlagen(2);
    let metriken = ChatMetriken::neu().unwrap();
    let (archiv, handle) = Archiv::neu(repo.clone(), 16, richtlinie(3), metriken.clone());
    tokio::spawn(archiv.ausfuehren());

    handle.anhaengen(Nachricht::neu("A", "hartnaeckig"));
    handle.historie().await;

    assert_eq!(repo.append_aufrufe(), 3);
    assert_eq!(repo.gespeichert(), vec![("A".to_string(), "hartnaeckig".to_string())]);
    assert_eq!(metriken.archiv_fehler_total.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_endgueltiger_fehler_wird_gezaehlt_und_uebersprungen() {
    let repo = TestRepo::neu();
    repo.append_fehlschlagen(3);
    let metriken = ChatMetriken::neu().unwrap();
    let (archiv, handle) = Archiv::neu(repo.clone(), 16, richtlinie(3), metriken.clone());
    tokio::spawn(archiv.ausfuehren());

    handle.anhaengen(Nachricht::neu("A", "verloren"));
    handle.anhaengen(Nachricht::neu("A", "gerettet"));
    handle.historie().await;

    assert_eq!(metriken.archiv_fehler_total.get(), 1);
    assert_eq!(repo.gespeichert(), vec![("A".to_string(), "gerettet".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_wartet_exponentiell() {
    let repo = TestRepo::neu();
    repo.append_fehlschlagen(2);
    let (archiv, handle) = Archiv::neu(repo.clone(), 16, richtlinie(3), ChatMetriken::neu().unwrap());
    tokio::spawn(archiv.ausfuehren());

    let start = tokio::time::Instant::now();
    handle.anhaengen(Nachricht::neu("A", "x"));
    handle.historie().await;

    // 50ms + 100ms Pause zwischen den drei Versuchen
    assert!(start.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_volle_queue_verwirft_und_zaehlt() {
    let repo = TestRepo::neu();
    let metriken = ChatMetriken::neu().unwrap();
    // Worker laeuft noch nicht: Queue mit einem Platz fuellt sich sofort
    let (archiv, handle) = Archiv::neu(repo.clone(), 1, richtlinie(1), metriken.clone());

    handle.anhaengen(Nachricht::neu("A", "passt"));
    handle.anhaengen(Nachricht::neu("A", "passt nicht"));

    let (historie_tx, historie_rx) = oneshot::channel();
    handle.historie_anfordern(historie_tx);
    assert!(historie_rx.await.is_err(), "Verworfene Anfrage -> Antwort faellt weg");
    assert_eq!(metriken.archiv_verworfen_total.get(), 2);

    drop(handle);
    archiv.ausfuehren().await;
    assert_eq!(repo.gespeichert(), vec![("A".to_string(), "passt".to_string())]);
}

#[tokio::test]
async fn test_worker_leert_queue_und_endet_ohne_handles() {
    let repo = TestRepo::neu();
    let (archiv, handle) = Archiv::neu(repo.clone(), 16, richtlinie(1), ChatMetriken::neu().unwrap());

    for i in 0..5 {
        handle.anhaengen(Nachricht::neu("A", format!("n{i}")));
    }
    drop(handle);

    tokio::time::timeout(Duration::from_secs(5), archiv.ausfuehren())
        .await
        .expect("Worker endet nach dem letzten Handle");
    assert_eq!(repo.gespeichert().len(), 5);
}

#[tokio::test]
async fn test_beendeter_worker_liefert_leeren_verlauf() {
    let repo = TestRepo::neu();
    let (archiv, handle) = Archiv::neu(repo, 16, richtlinie(1), ChatMetriken::neu().unwrap());
    drop(archiv);

    handle.anhaengen(Nachricht::neu("A", "ins leere"));
    assert!(handle.historie().await.is_empty());
}

#[tokio::test]
async fn test_mit_sqlite_in_memory() {
    let db = Arc::new(SqliteDb::in_memory().await.unwrap());
    let (archiv, handle) = Archiv::neu(db, 16, richtlinie(1), ChatMetriken::neu().unwrap());
    tokio::spawn(archiv.ausfuehren());

    handle.anhaengen(Nachricht::neu("A", "hi"));
    handle.anhaengen(Nachricht::neu("A", "yo"));

    assert_eq!(
        handle.historie().await,
        vec![Nachricht::neu("A", "hi"), Nachricht::neu("A", "yo")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_speicherfehler_meldet_datenbank_getrennt() {
    let repo = TestRepo::neu();
    let health = HealthState::neu();
    let (archiv, handle) = Archiv::neu(repo.clone(), 16, richtlinie(2), ChatMetriken::neu().unwrap());
    tokio::spawn(archiv.mit_health(health.clone()).ausfuehren());

    repo.append_fehlschlagen(2);
    handle.anhaengen(Nachricht::neu("A", "verloren"));
    repo.fetch_fehlschlagen();
    handle.historie().await;
    assert!(!health.db_verbunden());
    assert_eq!(health.status(), HealthStatus::Degraded);

    repo.fetch_reparieren();
    handle.anhaengen(Nachricht::neu("A", "wieder da"));
    handle.historie().await;
    assert!(health.db_verbunden());
    assert_eq!(health.status(), HealthStatus::Healthy);
}
