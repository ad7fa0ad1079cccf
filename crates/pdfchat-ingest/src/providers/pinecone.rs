//! Pinecone vector index for the remote backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::VectorIndexConfig;
use crate::error::{Error, Result};
use crate::types::Chunk;

use super::vector_store::VectorIndex;

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<PineconeVector<'a>>,
    namespace: &'a str,
}

#[derive(Serialize)]
struct PineconeVector<'a> {
    id: String,
    values: &'a [f32],
    metadata: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    upserted_count: usize,
}

/// Client for a single Pinecone index host
pub struct PineconeIndex {
    client: Client,
    index_host: String,
    api_key: String,
}

impl PineconeIndex {
    pub fn new(config: &VectorIndexConfig) -> Result<Self> {
        let api_key = config
            .pinecone
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("Pinecone API key not configured".to_string()))?;
        if config.pinecone.index_host.is_empty() {
            return Err(Error::Config("Pinecone index host not configured".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            index_host: config.pinecone.index_host.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Chunk metadata plus the chunk text, as stored alongside the vector
    fn vector_metadata(chunk: &Chunk) -> Result<Value> {
        let mut metadata = serde_json::to_value(&chunk.metadata)?;
        if let Value::Object(map) = &mut metadata {
            map.insert("text".to_string(), Value::String(chunk.content.clone()));
        }
        Ok(metadata)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, namespace: &str, chunks: &[Chunk]) -> Result<usize> {
        let mut vectors = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if !chunk.is_embedded() {
                return Err(Error::vector_index(format!(
                    "chunk {} has no embedding",
                    chunk.vector_id()
                )));
            }
            vectors.push(PineconeVector {
                id: chunk.vector_id(),
                values: &chunk.embedding,
                metadata: Self::vector_metadata(chunk)?,
            });
        }

        let url = format!("{}/vectors/upsert", self.index_host);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&UpsertRequest { vectors, namespace })
            .send()
            .await
            .map_err(|e| Error::vector_index(format!("Pinecone request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::vector_index(format!(
                "Pinecone upsert failed: HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let result: UpsertResponse = response
            .json()
            .await
            .map_err(|e| Error::vector_index(format!("Invalid Pinecone response: {}", e)))?;

        if result.upserted_count != chunks.len() {
            return Err(Error::vector_index(format!(
                "Pinecone upserted {} of {} vectors",
                result.upserted_count,
                chunks.len()
            )));
        }

        Ok(result.upserted_count)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/describe_index_stats", self.index_host);
        match self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&json!({}))
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}
