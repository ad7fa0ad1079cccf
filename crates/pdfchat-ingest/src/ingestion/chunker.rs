//! Cutting parsed pages into indexed chunks

use unicode_segmentation::UnicodeSegmentation;

use crate::config::{ChunkingConfig, ChunkingMode};
use crate::types::{Chunk, ChunkMetadata, FileRecord};

use super::parser::ParsedPdf;

/// Build the chunks of a document.
///
/// Chunk indices run across the whole document so vector ids stay unique.
/// Pages without text produce nothing.
pub fn chunk_pages(record: &FileRecord, parsed: &ParsedPdf, config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    match config.mode {
        ChunkingMode::Page => {
            for page in parsed.text_pages() {
                let metadata = ChunkMetadata::for_record(record, page.page_number, chunks.len() as u32);
                chunks.push(Chunk::new(page.content.clone(), metadata));
            }
        }
        ChunkingMode::Split => {
            let chunker = TextChunker::from_config(config);
            for page in parsed.text_pages() {
                for piece in chunker.split(&page.content) {
                    let metadata =
                        ChunkMetadata::for_record(record, page.page_number, chunks.len() as u32);
                    chunks.push(Chunk::new(piece, metadata));
                }
            }
        }
    }

    chunks
}

/// Sentence-aware chunker with configurable size and overlap
pub struct TextChunker {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Overlap between chunks
    overlap: usize,
    /// Minimum chunk size
    min_size: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            min_size: 50,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
            min_size: config.min_chunk_size,
        }
    }

    /// Split one page of text. A non-empty page always yields at least one chunk.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current_chunk = String::new();

        for sentence in self.split_into_sentences(text) {
            if !current_chunk.is_empty()
                && current_chunk.len() + sentence.len() > self.chunk_size
                && current_chunk.trim().len() >= self.min_size
            {
                chunks.push(current_chunk.trim().to_string());
                current_chunk = self.get_overlap_text(&current_chunk);
            }

            current_chunk.push_str(sentence);
        }

        let last = current_chunk.trim();
        if last.len() >= self.min_size || (chunks.is_empty() && !last.is_empty()) {
            chunks.push(last.to_string());
        } else if !last.is_empty() {
            // Short tail: fold into the previous chunk rather than drop it
            if let Some(previous) = chunks.last_mut() {
                let tail = last.strip_prefix(self.get_overlap_text(previous).trim()).unwrap_or(last);
                if !tail.trim().is_empty() {
                    previous.push(' ');
                    previous.push_str(tail.trim());
                }
            }
        }

        chunks
    }

    fn split_into_sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.split_sentence_bounds().collect()
    }

    /// Get overlap text from the end of a chunk
    fn get_overlap_text(&self, text: &str) -> String {
        if text.len() <= self.overlap {
            return text.to_string();
        }

        let mut start = text.len().saturating_sub(self.overlap);
        while start > 0 && !text.is_char_boundary(start) {
            start -= 1;
        }

        let overlap_text = &text[start..];

        // Prefer a sentence boundary, then a word boundary
        if let Some(pos) = overlap_text.find(". ") {
            return overlap_text[pos + 2..].to_string();
        }
        if let Some(pos) = overlap_text.find(' ') {
            return overlap_text[pos + 1..].to_string();
        }

        overlap_text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::parser::PageContent;

    fn record() -> FileRecord {
        FileRecord::processing(
            "key-1".to_string(),
            "report.pdf".to_string(),
            "user_1".to_string(),
            "https://files.example/key-1".to_string(),
        )
    }

    fn parsed(pages: &[&str]) -> ParsedPdf {
        ParsedPdf {
            pages: pages
                .iter()
                .enumerate()
                .map(|(i, text)| PageContent {
                    page_number: i as u32 + 1,
                    content: text.to_string(),
                })
                .collect(),
            content_hash: "00".repeat(32),
        }
    }

    #[test]
    fn test_page_mode_skips_empty_pages() {
        let record = record();
        let chunks = chunk_pages(
            &record,
            &parsed(&["First page.", "", "Third page."]),
            &ChunkingConfig::default(),
        );

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.page_number, 1);
        assert_eq!(chunks[0].metadata.chunk_index, 0);
        assert_eq!(chunks[1].metadata.page_number, 3);
        assert_eq!(chunks[1].metadata.chunk_index, 1);
        assert_eq!(chunks[1].metadata.document_id, record.id);
        assert_eq!(chunks[1].vector_id(), format!("{}#1", record.id));
    }

    #[test]
    fn test_split_mode_indices_run_across_pages() {
        let long_page: String = (0..20)
            .map(|i| format!("Sentence number {} is here. ", i))
            .collect();
        let config = ChunkingConfig {
            mode: ChunkingMode::Split,
            chunk_size: 100,
            chunk_overlap: 20,
            min_chunk_size: 10,
        };

        let chunks = chunk_pages(&record(), &parsed(&[&long_page, "Short."]), &config);

        assert!(chunks.len() > 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk_index, i as u32);
            assert!(chunk.content.len() <= 100, "chunk too long: {}", chunk.content.len());
        }
        let last = chunks.last().unwrap();
        assert_eq!(last.metadata.page_number, 2);
        assert_eq!(last.content, "Short.");
    }

    #[test]
    fn test_split_keeps_every_sentence() {
        let chunker = TextChunker::new(60, 0);
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu. Nu xi.";
        let chunks = chunker.split(text);

        let joined = chunks.join(" ");
        for word in ["Alpha", "Epsilon", "Iota", "Nu"] {
            assert!(joined.contains(word), "missing {}", word);
        }
    }
}
