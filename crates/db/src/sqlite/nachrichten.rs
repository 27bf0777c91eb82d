//! SQLite-Implementierung des NachrichtenRepository

use async_trait::async_trait;
use sqlx::Row as _;

use crate::error::DbResult;
use crate::models::NachrichtRecord;
use crate::repository::NachrichtenRepository;
use crate::sqlite::pool::SqliteDb;

#[async_trait]
impl NachrichtenRepository for SqliteDb {
    async fn append(&self, from: &str, content: &str) -> DbResult<i64> {
        let id = sqlx::query(r#"INSERT INTO messages ("from", content) VALUES (?, ?)"#)
            .bind(from)
            .bind(content)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        tracing::trace!(id, from, "Nachricht gespeichert");
        Ok(id)
    }

    async fn fetch_all(&self) -> DbResult<Vec<NachrichtRecord>> {
        let rows = sqlx::query(r#"SELECT id, "from", content FROM messages ORDER BY id ASC"#)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_nachricht).collect()
    }
}

pub(crate) fn row_to_nachricht(row: &sqlx::sqlite::SqliteRow) -> DbResult<NachrichtRecord> {
    Ok(NachrichtRecord {
        id: row.try_get("id")?,
        from: row.try_get("from")?,
        content: row.try_get("content")?,
    })
}
