//! Provider abstractions for embeddings and vector indexing
//!
//! Trait-based so the pipeline can switch between the local (Ollama + SQLite)
//! and remote (OpenAI + Pinecone) backends.

pub mod embedding;
pub mod local;
pub mod ollama;
pub mod openai;
pub mod pinecone;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use local::LocalVectorIndex;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;
pub use pinecone::PineconeIndex;
pub use vector_store::VectorIndex;
