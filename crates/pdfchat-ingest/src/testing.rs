//! Fixtures shared by the unit tests: generated PDFs and stub providers

use async_trait::async_trait;
use bytes::Bytes;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::ingestion::{FetchedFile, FileFetcher};
use crate::providers::{EmbeddingProvider, VectorIndex};
use crate::types::{Chunk, SubscriptionPlan, UploadCompleteEvent, UploadMetadata};

/// Build a PDF with `count` pages, page N reading "This is page N of the test document."
pub fn pdf_with_pages(count: u32) -> Vec<u8> {
    build_pdf(count, true)
}

/// Build a PDF with `count` pages and no text, like a scanned document
pub fn blank_pdf(count: u32) -> Vec<u8> {
    build_pdf(count, false)
}

fn build_pdf(count: u32, with_text: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for n in 1..=count {
        let operations = if with_text {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 712.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!(
                        "This is page {} of the test document.",
                        n
                    ))],
                ),
                Operation::new("ET", vec![]),
            ]
        } else {
            Vec::new()
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count as i64,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Trigger event for `storage_key` with the file served at `file_url`
pub fn upload_event(storage_key: &str, file_url: &str, is_active: bool) -> UploadCompleteEvent {
    UploadCompleteEvent {
        storage_key: storage_key.to_string(),
        display_name: format!("{}.pdf", storage_key),
        file_url: file_url.to_string(),
        metadata: UploadMetadata {
            user_id: "user_1".to_string(),
            subscription_plan: SubscriptionPlan {
                is_active,
                pages_ceiling: None,
            },
        },
    }
}

enum StaticResponse {
    Body(Bytes),
    Status(u16),
}

/// Fetcher serving canned responses by URL
#[derive(Default)]
pub struct StaticFetcher {
    responses: HashMap<String, StaticResponse>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: Vec<u8>) -> Self {
        self.responses
            .insert(url.to_string(), StaticResponse::Body(Bytes::from(body)));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses
            .insert(url.to_string(), StaticResponse::Status(status));
        self
    }

    /// Sleep before answering every request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileFetcher for StaticFetcher {
    async fn fetch(&self, url: &str, max_bytes: u64) -> Result<FetchedFile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.responses.get(url) {
            Some(StaticResponse::Body(bytes)) => {
                if bytes.len() as u64 > max_bytes {
                    return Err(Error::FileTooLarge {
                        size: bytes.len() as u64,
                        max: max_bytes,
                    });
                }
                Ok(FetchedFile {
                    bytes: bytes.clone(),
                })
            }
            Some(StaticResponse::Status(status)) => Err(Error::fetch_status(url, *status)),
            None => Err(Error::fetch_status(url, 404)),
        }
    }
}

/// Deterministic embedder; can be told to fail on a given batch call (1-indexed)
pub struct StubEmbedder {
    dimensions: usize,
    fail_on_call: Option<usize>,
    batch_calls: AtomicUsize,
    texts_embedded: AtomicUsize,
}

impl StubEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            fail_on_call: None,
            batch_calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
        }
    }

    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % self.dimensions] += byte as f32 / 255.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(Error::embedding("stub embedder rejected the batch"));
        }
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// In-memory index recording every upsert; can fail on a given call (1-indexed)
#[derive(Default)]
pub struct MemoryIndex {
    vectors: Mutex<HashMap<(String, String), Chunk>>,
    fail_on_call: Option<usize>,
    upsert_calls: AtomicUsize,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on_call(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.vectors.lock().len()
    }

    /// Chunks stored under `namespace`, ordered by chunk index
    pub fn chunks(&self, namespace: &str) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = self
            .vectors
            .lock()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, chunk)| chunk.clone())
            .collect();
        chunks.sort_by_key(|c| c.metadata.chunk_index);
        chunks
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, namespace: &str, chunks: &[Chunk]) -> Result<usize> {
        let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(Error::vector_index("memory index rejected the batch"));
        }

        let mut vectors = self.vectors.lock();
        for chunk in chunks {
            vectors.insert((namespace.to_string(), chunk.vector_id()), chunk.clone());
        }
        Ok(chunks.len())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
