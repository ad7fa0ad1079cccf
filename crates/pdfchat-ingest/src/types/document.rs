//! Chunk types carrying provenance back to the file record

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::FileRecord;

/// Provenance attached to every indexed chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// Owning FileRecord id
    pub document_id: Uuid,
    pub file_key: String,
    pub file_name: String,
    pub user_id: String,
    /// 1-indexed page the text came from
    pub page_number: u32,
    /// Position of the chunk within the document
    pub chunk_index: u32,
}

impl ChunkMetadata {
    /// Metadata for a chunk of `record` taken from `page_number`
    pub fn for_record(record: &FileRecord, page_number: u32, chunk_index: u32) -> Self {
        Self {
            document_id: record.id,
            file_key: record.key.clone(),
            file_name: record.name.clone(),
            user_id: record.user_id.clone(),
            page_number,
            chunk_index,
        }
    }
}

/// A piece of document text ready for embedding and indexing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Text content
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Embedding vector, empty until the embedding stage runs
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Create a chunk without an embedding
    pub fn new(content: String, metadata: ChunkMetadata) -> Self {
        Self {
            content,
            metadata,
            embedding: Vec::new(),
        }
    }

    /// Deterministic vector id, so an upsert of the same chunk overwrites instead of duplicating
    pub fn vector_id(&self) -> String {
        format!("{}#{}", self.metadata.document_id, self.metadata.chunk_index)
    }

    /// Whether the embedding stage has filled the vector
    pub fn is_embedded(&self) -> bool {
        !self.embedding.is_empty()
    }
}
