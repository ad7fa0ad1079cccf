//! SQLite database for file records, ingest jobs and local vectors
//!
//! The storage key carries a UNIQUE constraint and record creation is a
//! conflict-tolerant insert, so the idempotency guard holds under concurrent
//! triggers for the same key.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{
    Chunk, FileRecord, IngestJobRecord, JobCompletion, OutcomeKind, UploadStatus,
};

/// Counts of file records by status
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct FileStats {
    pub total: usize,
    pub processing: usize,
    pub success: usize,
    pub failed: usize,
}

/// SQLite-backed store shared by the pipeline, the routes and the local vector index
pub struct IngestDb {
    conn: Arc<Mutex<Connection>>,
}

impl IngestDb {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::database(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate(true)?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::database(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate(false)?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self, wal: bool) -> Result<()> {
        let conn = self.conn.lock();

        if wal {
            conn.execute_batch(
                r#"
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA busy_timeout=5000;
            "#,
            )
            .map_err(|e| Error::database(format!("Failed to set pragmas: {}", e)))?;
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                key TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                user_id TEXT NOT NULL,
                url TEXT NOT NULL,
                upload_status TEXT NOT NULL DEFAULT 'PROCESSING',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_files_user_id ON files(user_id);
            CREATE INDEX IF NOT EXISTS idx_files_upload_status ON files(upload_status);

            CREATE TABLE IF NOT EXISTS ingest_jobs (
                storage_key TEXT PRIMARY KEY,
                file_id TEXT NOT NULL UNIQUE,
                outcome TEXT NOT NULL DEFAULT 'pending',
                reason TEXT,
                page_count INTEGER,
                vectors_indexed INTEGER,
                content_hash TEXT,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                FOREIGN KEY (file_id) REFERENCES files(id)
            );

            -- Vectors for the local backend
            CREATE TABLE IF NOT EXISTS vectors (
                id TEXT NOT NULL,
                namespace TEXT NOT NULL,
                document_id TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (namespace, id)
            );

            CREATE INDEX IF NOT EXISTS idx_vectors_document_id ON vectors(namespace, document_id);
        "#,
        )
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("Database migrations complete");
        Ok(())
    }

    // ==================== File Record Operations ====================

    /// Insert a PROCESSING record unless one already exists for its key.
    ///
    /// Returns `None` when the key is already present; nothing is written in
    /// that case. The ingest job row is created in the same transaction.
    pub fn create_if_absent(&self, record: &FileRecord) -> Result<Option<FileRecord>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            r#"
            INSERT INTO files (id, key, name, user_id, url, upload_status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(key) DO NOTHING
            "#,
            params![
                record.id.to_string(),
                record.key,
                record.name,
                record.user_id,
                record.url,
                record.upload_status.as_str(),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;

        if inserted == 0 {
            tx.commit()?;
            return Ok(None);
        }

        tx.execute(
            r#"
            INSERT INTO ingest_jobs (storage_key, file_id, outcome, started_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                record.key,
                record.id.to_string(),
                OutcomeKind::Pending.as_str(),
                record.created_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(Some(record.clone()))
    }

    /// Move a PROCESSING record to a terminal status and store the run's outcome.
    ///
    /// Returns `false` if the record was not PROCESSING (already terminal or missing).
    pub fn complete(
        &self,
        file_id: Uuid,
        status: UploadStatus,
        outcome: OutcomeKind,
        completion: &JobCompletion,
    ) -> Result<bool> {
        if !status.is_terminal() {
            return Err(Error::internal(format!(
                "cannot complete file {} with non-terminal status {}",
                file_id, status
            )));
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let updated = tx.execute(
            r#"
            UPDATE files SET upload_status = ?2, updated_at = ?3
            WHERE id = ?1 AND upload_status = 'PROCESSING'
            "#,
            params![file_id.to_string(), status.as_str(), now],
        )?;

        if updated == 0 {
            tx.commit()?;
            return Ok(false);
        }

        tx.execute(
            r#"
            UPDATE ingest_jobs SET
                outcome = ?2,
                reason = ?3,
                page_count = ?4,
                vectors_indexed = ?5,
                content_hash = ?6,
                finished_at = ?7
            WHERE file_id = ?1
            "#,
            params![
                file_id.to_string(),
                outcome.as_str(),
                completion.reason,
                completion.page_count.map(i64::from),
                completion.vectors_indexed.map(i64::from),
                completion.content_hash,
                now,
            ],
        )?;

        tx.commit()?;
        Ok(true)
    }

    /// Get a file record by storage key
    pub fn get_by_key(&self, key: &str) -> Result<Option<FileRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT id, key, name, user_id, url, upload_status, created_at, updated_at
                 FROM files WHERE key = ?1",
                params![key],
                row_to_file_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Get a file record by id
    pub fn get_by_id(&self, id: Uuid) -> Result<Option<FileRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT id, key, name, user_id, url, upload_status, created_at, updated_at
                 FROM files WHERE id = ?1",
                params![id.to_string()],
                row_to_file_record,
            )
            .optional()?;
        Ok(record)
    }

    /// List a user's file records, newest first
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<FileRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, key, name, user_id, url, upload_status, created_at, updated_at
             FROM files WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;

        let records = stmt
            .query_map(params![user_id], row_to_file_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Get file record statistics
    pub fn get_stats(&self) -> Result<FileStats> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT upload_status, COUNT(*) FROM files GROUP BY upload_status")?;

        let mut stats = FileStats::default();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            let count = count as usize;
            stats.total += count;
            match UploadStatus::parse(&status) {
                Some(UploadStatus::Processing) => stats.processing += count,
                Some(UploadStatus::Success) => stats.success += count,
                Some(UploadStatus::Failed) => stats.failed += count,
                None => tracing::warn!("Unknown upload status in database: {}", status),
            }
        }
        Ok(stats)
    }

    // ==================== Ingest Job Operations ====================

    /// Get the ingest job for a file record
    pub fn get_ingest_job(&self, file_id: Uuid) -> Result<Option<IngestJobRecord>> {
        let conn = self.conn.lock();
        let job = conn
            .query_row(
                "SELECT storage_key, file_id, outcome, reason, page_count, vectors_indexed,
                        content_hash, started_at, finished_at
                 FROM ingest_jobs WHERE file_id = ?1",
                params![file_id.to_string()],
                row_to_ingest_job,
            )
            .optional()?;
        Ok(job)
    }

    // ==================== Vector Operations (local backend) ====================

    /// Insert or replace vectors; all rows land in one transaction
    pub fn upsert_vectors(&self, namespace: &str, chunks: &[Chunk]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO vectors
                    (id, namespace, document_id, content, embedding, metadata, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;

            for chunk in chunks {
                if !chunk.is_embedded() {
                    return Err(Error::vector_index(format!(
                        "chunk {} has no embedding",
                        chunk.vector_id()
                    )));
                }
                let metadata = serde_json::to_string(&chunk.metadata)?;
                stmt.execute(params![
                    chunk.vector_id(),
                    namespace,
                    chunk.metadata.document_id.to_string(),
                    chunk.content,
                    encode_embedding(&chunk.embedding),
                    metadata,
                    now,
                ])?;
            }
        }

        tx.commit()?;
        Ok(chunks.len())
    }
}

#[cfg(test)]
impl IngestDb {
    /// Number of file records with the given key (at most one)
    pub fn count_by_key(&self, key: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM files WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Count vectors in a namespace, optionally for one document
    pub fn count_vectors(&self, namespace: &str, document_id: Option<Uuid>) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = match document_id {
            Some(id) => conn.query_row(
                "SELECT COUNT(*) FROM vectors WHERE namespace = ?1 AND document_id = ?2",
                params![namespace, id.to_string()],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM vectors WHERE namespace = ?1",
                params![namespace],
                |row| row.get(0),
            )?,
        };
        Ok(count as usize)
    }

    /// Embeddings stored for a document, ordered by vector id
    pub fn document_embeddings(&self, namespace: &str, document_id: Uuid) -> Result<Vec<Vec<f32>>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT embedding FROM vectors
             WHERE namespace = ?1 AND document_id = ?2
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![namespace, document_id.to_string()], |row| {
                row.get::<_, Vec<u8>>(0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.iter().map(|b| decode_embedding(b)).collect())
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[cfg(test)]
fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_uuid(idx: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_file_record(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
    let id_str: String = row.get(0)?;
    let status_str: String = row.get(5)?;
    let created_at_str: String = row.get(6)?;
    let updated_at_str: String = row.get(7)?;

    let upload_status = UploadStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(5, status_str.clone(), rusqlite::types::Type::Text)
    })?;

    Ok(FileRecord {
        id: parse_uuid(0, &id_str)?,
        key: row.get(1)?,
        name: row.get(2)?,
        user_id: row.get(3)?,
        url: row.get(4)?,
        upload_status,
        created_at: parse_timestamp(6, &created_at_str)?,
        updated_at: parse_timestamp(7, &updated_at_str)?,
    })
}

fn row_to_ingest_job(row: &rusqlite::Row) -> rusqlite::Result<IngestJobRecord> {
    let file_id_str: String = row.get(1)?;
    let outcome_str: String = row.get(2)?;
    let page_count: Option<i64> = row.get(4)?;
    let vectors_indexed: Option<i64> = row.get(5)?;
    let started_at_str: String = row.get(7)?;
    let finished_at_str: Option<String> = row.get(8)?;

    let outcome = OutcomeKind::parse(&outcome_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(2, outcome_str.clone(), rusqlite::types::Type::Text)
    })?;

    Ok(IngestJobRecord {
        storage_key: row.get(0)?,
        file_id: parse_uuid(1, &file_id_str)?,
        outcome,
        reason: row.get(3)?,
        page_count: page_count.map(|c| c as u32),
        vectors_indexed: vectors_indexed.map(|c| c as u32),
        content_hash: row.get(6)?,
        started_at: parse_timestamp(7, &started_at_str)?,
        finished_at: finished_at_str
            .map(|s| parse_timestamp(8, &s))
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;

    fn record(key: &str) -> FileRecord {
        FileRecord::processing(
            key.to_string(),
            format!("{}.pdf", key),
            "kp_user".to_string(),
            format!("https://files.example/{}", key),
        )
    }

    #[test]
    fn test_create_if_absent_is_idempotent() {
        let db = IngestDb::in_memory().unwrap();

        let first = db.create_if_absent(&record("key-1")).unwrap();
        assert!(first.is_some());

        let second = db.create_if_absent(&record("key-1")).unwrap();
        assert!(second.is_none());

        assert_eq!(db.count_by_key("key-1").unwrap(), 1);
        let stored = db.get_by_key("key-1").unwrap().unwrap();
        assert_eq!(stored.id, first.unwrap().id);
        assert_eq!(stored.upload_status, UploadStatus::Processing);
    }

    #[test]
    fn test_create_opens_pending_job() {
        let db = IngestDb::in_memory().unwrap();
        let created = db.create_if_absent(&record("key-2")).unwrap().unwrap();

        let job = db.get_ingest_job(created.id).unwrap().unwrap();
        assert_eq!(job.storage_key, "key-2");
        assert_eq!(job.outcome, OutcomeKind::Pending);
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn test_terminal_status_is_final() {
        let db = IngestDb::in_memory().unwrap();
        let created = db.create_if_absent(&record("key-3")).unwrap().unwrap();

        let completion = JobCompletion {
            page_count: Some(3),
            vectors_indexed: Some(3),
            ..Default::default()
        };
        assert!(db
            .complete(created.id, UploadStatus::Success, OutcomeKind::Success, &completion)
            .unwrap());

        let late_failure = JobCompletion {
            reason: Some("late".to_string()),
            ..Default::default()
        };
        assert!(!db
            .complete(created.id, UploadStatus::Failed, OutcomeKind::FatalFailure, &late_failure)
            .unwrap());

        let stored = db.get_by_id(created.id).unwrap().unwrap();
        assert_eq!(stored.upload_status, UploadStatus::Success);

        let job = db.get_ingest_job(created.id).unwrap().unwrap();
        assert_eq!(job.outcome, OutcomeKind::Success);
        assert_eq!(job.vectors_indexed, Some(3));
        assert!(job.reason.is_none());
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_complete_rejects_processing() {
        let db = IngestDb::in_memory().unwrap();
        let created = db.create_if_absent(&record("key-4")).unwrap().unwrap();
        let result = db.complete(
            created.id,
            UploadStatus::Processing,
            OutcomeKind::Pending,
            &JobCompletion::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_list_for_user_and_stats() {
        let db = IngestDb::in_memory().unwrap();
        let a = db.create_if_absent(&record("a")).unwrap().unwrap();
        db.create_if_absent(&record("b")).unwrap();
        db.create_if_absent(&FileRecord::processing(
            "c".to_string(),
            "c.pdf".to_string(),
            "someone_else".to_string(),
            "https://files.example/c".to_string(),
        ))
        .unwrap();

        db.complete(a.id, UploadStatus::Failed, OutcomeKind::QuotaExceeded, &JobCompletion::default())
            .unwrap();

        assert_eq!(db.list_for_user("kp_user").unwrap().len(), 2);

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.processing, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.success, 0);
    }

    #[test]
    fn test_vector_upsert_overwrites_same_id() {
        let db = IngestDb::in_memory().unwrap();
        let created = db.create_if_absent(&record("vec")).unwrap().unwrap();

        let mut chunk = Chunk::new(
            "page one".to_string(),
            ChunkMetadata::for_record(&created, 1, 0),
        );
        chunk.embedding = vec![0.5, -0.25, 1.0];

        db.upsert_vectors("ns", std::slice::from_ref(&chunk)).unwrap();
        db.upsert_vectors("ns", std::slice::from_ref(&chunk)).unwrap();

        assert_eq!(db.count_vectors("ns", Some(created.id)).unwrap(), 1);
        assert_eq!(db.count_vectors("other", None).unwrap(), 0);
        assert_eq!(
            db.document_embeddings("ns", created.id).unwrap(),
            vec![vec![0.5, -0.25, 1.0]]
        );
    }

    #[test]
    fn test_upsert_rejects_unembedded_chunk() {
        let db = IngestDb::in_memory().unwrap();
        let created = db.create_if_absent(&record("raw")).unwrap().unwrap();
        let chunk = Chunk::new("text".to_string(), ChunkMetadata::for_record(&created, 1, 0));

        assert!(db.upsert_vectors("ns", &[chunk]).is_err());
        assert_eq!(db.count_vectors("ns", None).unwrap(), 0);
    }
}
