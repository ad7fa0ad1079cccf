//! Local vector index stored in the service database

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::storage::IngestDb;
use crate::types::Chunk;

use super::vector_store::VectorIndex;

/// Vector index backed by the `vectors` table of [`IngestDb`]
pub struct LocalVectorIndex {
    db: Arc<IngestDb>,
}

impl LocalVectorIndex {
    pub fn new(db: Arc<IngestDb>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    async fn upsert(&self, namespace: &str, chunks: &[Chunk]) -> Result<usize> {
        // IngestDb is sync, wrap in blocking task
        let db = self.db.clone();
        let namespace = namespace.to_string();
        let chunks = chunks.to_vec();
        tokio::task::spawn_blocking(move || db.upsert_vectors(&namespace, &chunks))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    async fn health_check(&self) -> Result<bool> {
        let db = self.db.clone();
        let healthy = tokio::task::spawn_blocking(move || db.get_stats().is_ok())
            .await
            .unwrap_or(false);
        Ok(healthy)
    }

    fn name(&self) -> &str {
        "local-sqlite"
    }
}
