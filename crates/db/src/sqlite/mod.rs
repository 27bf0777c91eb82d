//! SQLite-Backend-Implementierung des NachrichtenRepository

pub mod nachrichten;
pub mod pool;

pub use pool::SqliteDb;
