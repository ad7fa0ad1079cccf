//! Vector index trait for upserting document embeddings

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Chunk;

/// Trait for writing embedded chunks to a vector index
///
/// Implementations:
/// - `LocalVectorIndex`: vectors table in the service's SQLite database
/// - `PineconeIndex`: Pinecone data-plane `/vectors/upsert`
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upsert embedded chunks under `namespace`, keyed by `Chunk::vector_id`.
    ///
    /// Returns the number of vectors written. Chunks without an embedding are an error.
    async fn upsert(&self, namespace: &str, chunks: &[Chunk]) -> Result<usize>;

    /// Check if the index is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
