// src/notebook/store.rs
// SQLite persistence for exported notebooks.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use super::{MIN_MESSAGES_FOR_EXPORT, NotebookDocument};
use crate::session::Message;

pub struct NotebookStore {
    pool: SqlitePool,
}

impl NotebookStore {
    /// Wraps a pool and makes sure the notebooks table exists.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS notebooks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                notebook_type TEXT NOT NULL DEFAULT 'analysis',
                source_data TEXT,
                workspace_id TEXT NOT NULL DEFAULT 'public'
            )",
        )
        .execute(&pool)
        .await
        .context("Failed to initialize notebooks table")?;
        Ok(Self { pool })
    }

    /// Exports a transcript under `title`. Requires a non-empty title and at
    /// least one exchange beyond the welcome message.
    pub async fn export_chat(&self, messages: &[Message], title: &str) -> Result<i64> {
        let title = title.trim();
        if title.is_empty() {
            bail!("El título no puede estar vacío.");
        }
        if messages.len() < MIN_MESSAGES_FOR_EXPORT {
            bail!("Necesitas al menos una conversación para crear un notebook.");
        }

        let document = NotebookDocument::from_messages(messages, title, chrono::Local::now());
        let content = serde_json::to_string(&document)?;
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO notebooks (title, content, created_at, updated_at, notebook_type, workspace_id)
             VALUES ($1, $2, $3, $4, 'analysis', 'public')",
        )
        .bind(title)
        .bind(&content)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .context("Failed to save notebook")?;

        let id = result.last_insert_rowid();
        info!(id, title, cells = document.cells.len(), "notebook saved");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    async fn store() -> NotebookStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        NotebookStore::new(pool).await.unwrap()
    }

    fn transcript() -> Vec<Message> {
        vec![Message::assistant("¡Hola!"), Message::user("¿Qué es la tutela?")]
    }

    #[tokio::test]
    async fn export_persists_notebook_row() {
        let store = store().await;
        let id = store.export_chat(&transcript(), "Tutela").await.unwrap();
        assert!(id > 0);

        let row = sqlx::query("SELECT title, notebook_type, workspace_id, content FROM notebooks WHERE id = $1")
            .bind(id)
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("title"), "Tutela");
        assert_eq!(row.get::<String, _>("notebook_type"), "analysis");
        assert_eq!(row.get::<String, _>("workspace_id"), "public");
        let content: String = row.get("content");
        assert!(content.contains("Consulta 1"));
    }

    #[tokio::test]
    async fn empty_title_is_rejected() {
        let store = store().await;
        let err = store.export_chat(&transcript(), "   ").await.unwrap_err();
        assert!(err.to_string().contains("título"));
    }

    #[tokio::test]
    async fn welcome_only_transcript_is_rejected() {
        let store = store().await;
        let err = store
            .export_chat(&[Message::assistant("¡Hola!")], "Tutela")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("al menos una conversación"));
    }
}
