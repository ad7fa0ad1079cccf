//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::Result;

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OpenAiEmbedder`: OpenAI-compatible `/embeddings` endpoint (text-embedding-ada-002)
/// - `OllamaEmbedder`: Local Ollama server (nomic-embed-text)
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order
    ///
    /// Default implementation calls `embed` sequentially.
    /// Implementations should override for better performance.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Get embedding dimensions (e.g., 1536 for text-embedding-ada-002)
    fn dimensions(&self) -> usize;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Retry a request with exponential backoff (1s, 2s, 4s, ...).
///
/// Only transient errors are retried; a rejected request (401, 400, ...) is
/// returned immediately. `max_retries` of zero runs the operation exactly once.
pub(crate) async fn retry_request<F, Fut, T>(max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries && e.is_transient() => {
                let delay = Duration::from_secs(2u64.pow(attempt));
                tracing::warn!(
                    "Request failed (attempt {}/{}): {}, retrying in {:?}",
                    attempt + 1,
                    max_retries + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Check that a provider returned one vector of the expected size per input
pub(crate) fn check_embeddings(
    provider: &str,
    expected_count: usize,
    dimensions: usize,
    embeddings: &[Vec<f32>],
) -> Result<()> {
    if embeddings.len() != expected_count {
        return Err(crate::error::Error::embedding(format!(
            "{} returned {} embeddings for {} inputs",
            provider,
            embeddings.len(),
            expected_count
        )));
    }
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
        return Err(crate::error::Error::embedding(format!(
            "{} returned a {}-dimensional embedding, expected {}",
            provider,
            bad.len(),
            dimensions
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_request(0, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::embedding("down"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers() {
        let calls = AtomicU32::new(0);
        let result = retry_request(2, || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::embedding("blip"))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_request_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_request(3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::embedding_status(401, "invalid api key"))
        })
        .await;

        assert!(matches!(result, Err(Error::Embedding { status: Some(401), .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_check_embeddings() {
        assert!(check_embeddings("x", 2, 3, &[vec![0.0; 3], vec![0.0; 3]]).is_ok());
        assert!(check_embeddings("x", 2, 3, &[vec![0.0; 3]]).is_err());
        assert!(check_embeddings("x", 1, 3, &[vec![0.0; 4]]).is_err());
    }
}
