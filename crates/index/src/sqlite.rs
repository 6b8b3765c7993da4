//! SQLite-backed vector store.
//!
//! One database file holds every workspace. Rows are keyed by
//! `(collection, id)` where `collection` is the workspace's collection name,
//! so reopening the same workspace id reattaches to the same rows. Filters
//! are pushed into the `WHERE` clause and similarity is computed over the
//! filtered rows before top-k selection.

use crate::store::{EmbeddedChunk, VectorStore, to_context};
use crate::vector::{blob_to_embedding, embedding_to_blob, similarity_score, top_k};
use async_trait::async_trait;
use chrono::Utc;
use repolens_core::error::IndexError;
use repolens_core::{Chunk, ConstructKind, RetrievedContext, SearchFilters, WorkspaceId};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub async fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                IndexError::Storage(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| IndexError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self::from_pool(pool).await?;
        info!("SQLite vector store opened at {}", path.display());
        Ok(store)
    }

    /// An ephemeral database living in a single connection.
    pub async fn in_memory() -> Result<Self, IndexError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| IndexError::Storage(format!("Invalid SQLite URL: {e}")))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| IndexError::Storage(format!("Failed to open SQLite: {e}")))?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, IndexError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), IndexError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                collection     TEXT NOT NULL,
                id             TEXT NOT NULL,
                file_path      TEXT NOT NULL,
                content        TEXT NOT NULL,
                construct_kind TEXT NOT NULL,
                name           TEXT NOT NULL DEFAULT '',
                line_start     INTEGER NOT NULL,
                line_end       INTEGER NOT NULL,
                language       TEXT NOT NULL,
                content_hash   TEXT NOT NULL,
                embedding      BLOB NOT NULL,
                updated_at     TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexError::MigrationFailed(format!("chunks table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chunks_collection_path ON chunks(collection, file_path)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexError::MigrationFailed(format!("file_path index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<EmbeddedChunk, IndexError> {
        let col = |name: &str| IndexError::QueryFailed(format!("{name} column"));

        let kind: String = row.try_get("construct_kind").map_err(|_| col("construct_kind"))?;
        let construct_kind = ConstructKind::parse(&kind)
            .ok_or_else(|| IndexError::QueryFailed(format!("unknown construct kind '{kind}'")))?;
        let line_start: i64 = row.try_get("line_start").map_err(|_| col("line_start"))?;
        let line_end: i64 = row.try_get("line_end").map_err(|_| col("line_end"))?;
        let blob: Vec<u8> = row.try_get("embedding").map_err(|_| col("embedding"))?;

        Ok(EmbeddedChunk {
            chunk: Chunk {
                id: row.try_get("id").map_err(|_| col("id"))?,
                file_path: row.try_get("file_path").map_err(|_| col("file_path"))?,
                content: row.try_get("content").map_err(|_| col("content"))?,
                // Never persisted; only the embedder reads it.
                embedding_text: String::new(),
                construct_kind,
                name: row.try_get("name").map_err(|_| col("name"))?,
                line_start: line_start as usize,
                line_end: line_end as usize,
                language: row.try_get("language").map_err(|_| col("language"))?,
                content_hash: row.try_get("content_hash").map_err(|_| col("content_hash"))?,
            },
            embedding: blob_to_embedding(&blob),
        })
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn upsert(
        &self,
        workspace: &WorkspaceId,
        records: Vec<EmbeddedChunk>,
    ) -> Result<(), IndexError> {
        let collection = workspace.collection_name();
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::Storage(format!("BEGIN failed: {e}")))?;

        for EmbeddedChunk { chunk, embedding } in &records {
            sqlx::query(
                r#"
                INSERT INTO chunks (collection, id, file_path, content, construct_kind, name,
                                    line_start, line_end, language, content_hash, embedding, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                ON CONFLICT(collection, id) DO UPDATE SET
                    content = excluded.content,
                    construct_kind = excluded.construct_kind,
                    name = excluded.name,
                    line_start = excluded.line_start,
                    line_end = excluded.line_end,
                    language = excluded.language,
                    embedding = excluded.embedding,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&collection)
            .bind(&chunk.id)
            .bind(&chunk.file_path)
            .bind(&chunk.content)
            .bind(chunk.construct_kind.as_str())
            .bind(&chunk.name)
            .bind(chunk.line_start as i64)
            .bind(chunk.line_end as i64)
            .bind(&chunk.language)
            .bind(&chunk.content_hash)
            .bind(embedding_to_blob(embedding))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| IndexError::Storage(format!("UPSERT failed for {}: {e}", chunk.id)))?;
        }

        tx.commit()
            .await
            .map_err(|e| IndexError::Storage(format!("COMMIT failed: {e}")))?;
        debug!(collection = %collection, rows = records.len(), "Upserted chunks");
        Ok(())
    }

    async fn query(
        &self,
        workspace: &WorkspaceId,
        vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<RetrievedContext>, IndexError> {
        let mut sql = String::from("SELECT * FROM chunks WHERE collection = ?");
        if filters.language.is_some() {
            sql.push_str(" AND language = ?");
        }
        if filters.file_path_contains.is_some() {
            sql.push_str(" AND instr(file_path, ?) > 0");
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query(&sql).bind(workspace.collection_name());
        if let Some(language) = &filters.language {
            query = query.bind(language);
        }
        if let Some(needle) = &filters.file_path_contains {
            query = query.bind(needle);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IndexError::QueryFailed(format!("Vector scan: {e}")))?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = Self::row_to_record(row)?;
            scored.push((similarity_score(&record.embedding, vector), record.chunk));
        }

        Ok(top_k(scored, k)
            .into_iter()
            .map(|(score, chunk)| to_context(&chunk, score))
            .collect())
    }

    async fn count(&self, workspace: &WorkspaceId) -> Result<usize, IndexError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM chunks WHERE collection = ?1")
            .bind(workspace.collection_name())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexError::QueryFailed(format!("COUNT: {e}")))?;
        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| IndexError::QueryFailed(format!("cnt column: {e}")))?;
        Ok(cnt as usize)
    }

    async fn ids_for_file(
        &self,
        workspace: &WorkspaceId,
        file_path: &str,
    ) -> Result<Vec<String>, IndexError> {
        let rows = sqlx::query("SELECT id FROM chunks WHERE collection = ?1 AND file_path = ?2")
            .bind(workspace.collection_name())
            .bind(file_path)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IndexError::QueryFailed(format!("ids for {file_path}: {e}")))?;
        rows.iter()
            .map(|r| {
                r.try_get("id")
                    .map_err(|e| IndexError::QueryFailed(format!("id column: {e}")))
            })
            .collect()
    }

    async fn delete(&self, workspace: &WorkspaceId, ids: &[String]) -> Result<usize, IndexError> {
        let collection = workspace.collection_name();
        let mut removed = 0;
        for id in ids {
            let result = sqlx::query("DELETE FROM chunks WHERE collection = ?1 AND id = ?2")
                .bind(&collection)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| IndexError::Storage(format!("DELETE failed: {e}")))?;
            removed += result.rows_affected() as usize;
        }
        Ok(removed)
    }
}
