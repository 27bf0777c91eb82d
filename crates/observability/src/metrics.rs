//! Prometheus-kompatible Metriken fuer Stammtisch
//!
//! Registrierte Metriken:
//! - `stammtisch_aktive_sessions` - Gauge: Aktuell laufende Sessions
//! - `stammtisch_raum_mitglieder` - Gauge: Mitglieder im Raum
//! - `stammtisch_nachrichten_total` - Counter: Vom Raum verteilte Nachrichten
//! - `stammtisch_verdraengungen_total` - Counter: Wegen voller Mailbox entfernte Mitglieder
//! - `stammtisch_abgelehnte_handshakes_total` - Counter: Gescheiterte TLS/WebSocket-Handshakes
//! - `stammtisch_archiv_fehler_total` - Counter: Endgueltig fehlgeschlagene Speicherungen
//! - `stammtisch_archiv_verworfen_total` - Counter: Wegen voller Archiv-Queue verworfene Nachrichten

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Stammtisch-Prometheus-Metriken
///
/// Clone ist billig; alle Klone zaehlen in dieselbe Registry.
#[derive(Clone)]
pub struct ChatMetriken {
    pub registry: Arc<Registry>,

    pub aktive_sessions: IntGauge,
    pub raum_mitglieder: IntGauge,
    pub nachrichten_total: IntCounter,
    pub verdraengungen_total: IntCounter,
    pub abgelehnte_handshakes_total: IntCounter,
    pub archiv_fehler_total: IntCounter,
    pub archiv_verworfen_total: IntCounter,
}

impl ChatMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let aktive_sessions = IntGauge::with_opts(Opts::new(
            "stammtisch_aktive_sessions",
            "Anzahl aktuell laufender Sessions",
        ))?;
        registry.register(Box::new(aktive_sessions.clone()))?;

        let raum_mitglieder = IntGauge::with_opts(Opts::new(
            "stammtisch_raum_mitglieder",
            "Anzahl Mitglieder im Raum",
        ))?;
        registry.register(Box::new(raum_mitglieder.clone()))?;

        let nachrichten_total = zaehler(
            &registry,
            "stammtisch_nachrichten_total",
            "Vom Raum verteilte Nachrichten",
        )?;
        let verdraengungen_total = zaehler(
            &registry,
            "stammtisch_verdraengungen_total",
            "Wegen voller Mailbox entfernte Mitglieder",
        )?;
        let abgelehnte_handshakes_total = zaehler(
            &registry,
            "stammtisch_abgelehnte_handshakes_total",
            "Gescheiterte TLS- oder WebSocket-Handshakes",
        )?;
        let archiv_fehler_total = zaehler(
            &registry,
            "stammtisch_archiv_fehler_total",
            "Endgueltig fehlgeschlagene Speicherungen",
        )?;
        let archiv_verworfen_total = zaehler(
            &registry,
            "stammtisch_archiv_verworfen_total",
            "Wegen voller Archiv-Queue verworfene Nachrichten",
        )?;

        Ok(Self {
            registry: Arc::new(registry),
            aktive_sessions,
            raum_mitglieder,
            nachrichten_total,
            verdraengungen_total,
            abgelehnte_handshakes_total,
            archiv_fehler_total,
            archiv_verworfen_total,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl std::fmt::Debug for ChatMetriken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatMetriken")
            .field("aktive_sessions", &self.aktive_sessions.get())
            .field("raum_mitglieder", &self.raum_mitglieder.get())
            .finish_non_exhaustive()
    }
}

fn zaehler(registry: &Registry, name: &str, hilfe: &str) -> Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: ChatMetriken) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<ChatMetriken>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
