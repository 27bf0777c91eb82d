//! # stammtisch-observability
//!
//! Observability-Crate fuer Stammtisch:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging via tracing-subscriber

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::{health_router, HealthResponse, HealthState, HealthStatus};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, ChatMetriken};

use anyhow::Result;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Betreibt den Observability-HTTP-Server (Metriken + Health) auf `listener`
///
/// Endpunkte:
/// - `GET /metrics` - Prometheus scrape format
/// - `GET /health`  - Health-Check JSON
///
/// Laeuft bis `shutdown` ausgeloest wird.
pub async fn observability_server_ausfuehren(
    listener: TcpListener,
    metriken: ChatMetriken,
    health: HealthState,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = metrics_router(metriken).merge(health_router(health));

    tracing::info!(addr = %listener.local_addr()?, "Observability-Server gestartet");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("Observability-Server beendet");
    Ok(())
}
