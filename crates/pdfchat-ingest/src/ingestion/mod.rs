//! Ingestion stages ahead of embedding: fetch, parse, chunk

pub mod chunker;
pub mod fetcher;
pub mod parser;

pub use chunker::{chunk_pages, TextChunker};
pub use fetcher::{FetchedFile, FileFetcher, HttpFetcher};
pub use parser::{PageContent, ParsedPdf, PdfParser};
