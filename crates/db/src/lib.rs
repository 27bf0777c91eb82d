//! stammtisch-db – Nachrichten-Persistenz
//!
//! Dieses Crate stellt das Repository-Pattern fuer den Chat-Verlauf bereit.
//! Der Raum kennt nur die zwei Operationen von `NachrichtenRepository`
//! (anhaengen, alles laden); die SQLite-Implementierung liegt in `sqlite`.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::{DbError, DbResult};
pub use models::NachrichtRecord;
pub use repository::{DatabaseConfig, NachrichtenRepository};
pub use sqlite::SqliteDb;
