//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `STAMMTISCH_LOG_LEVEL`: Filter (z.B. `info` oder `stammtisch_chat=debug`), Standard: info
//! - `STAMMTISCH_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Umgebungsvariablen haben Vorrang vor der Konfigurationsdatei.

use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "STAMMTISCH_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "STAMMTISCH_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// `level` und `format` stammen aus der Konfiguration und werden von
/// `STAMMTISCH_LOG_LEVEL` / `STAMMTISCH_LOG_FORMAT` ueberschrieben.
/// Ein zweiter Aufruf (z.B. in Tests) ist wirkungslos.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let env_format = std::env::var(ENV_LOG_FORMAT).ok();
    let format = format_waehlen(env_format.as_deref(), format);

    let ergebnis = match format {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init(),
        _ => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    if ergebnis.is_err() {
        tracing::debug!("Logging bereits initialisiert");
    }
}

/// Waehlt das Log-Format: gueltiger Env-Wert vor Konfiguration, sonst `text`
fn format_waehlen<'a>(env: Option<&'a str>, konfiguriert: &'a str) -> &'a str {
    match env {
        Some(wert) if log_format_gueltig(wert) => wert,
        _ if log_format_gueltig(konfiguriert) => konfiguriert,
        _ => "text",
    }
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_werte() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(log_level_gueltig(level));
        }
        assert!(!log_level_gueltig("verbose"));
        assert!(!log_level_gueltig("INFO")); // Gross-/Kleinschreibung
        assert!(!log_level_gueltig(""));
    }

    #[test]
    fn log_format_werte() {
        assert!(log_format_gueltig("text"));
        assert!(log_format_gueltig("json"));
        assert!(!log_format_gueltig("xml"));
        assert!(!log_format_gueltig("JSON"));
    }

    #[test]
    fn env_format_hat_vorrang() {
        assert_eq!(format_waehlen(Some("json"), "text"), "json");
        assert_eq!(format_waehlen(None, "json"), "json");
    }

    #[test]
    fn ungueltige_formate_fallen_auf_text() {
        assert_eq!(format_waehlen(Some("xml"), "json"), "json");
        assert_eq!(format_waehlen(Some("xml"), "yaml"), "text");
        assert_eq!(format_waehlen(None, ""), "text");
    }

    #[test]
    fn doppelte_initialisierung_panikt_nicht() {
        logging_initialisieren("info", "text");
        logging_initialisieren("debug", "json");
    }
}
