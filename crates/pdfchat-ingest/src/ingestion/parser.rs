//! PDF parsing into page-level text

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Content from a single page
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Text content of the page, empty if nothing could be extracted
    pub content: String,
}

impl PageContent {
    pub fn has_text(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Parsed PDF with ordered pages
#[derive(Debug, Clone)]
pub struct ParsedPdf {
    /// Every page of the document, including pages without text
    pub pages: Vec<PageContent>,
    /// SHA-256 of the raw file bytes
    pub content_hash: String,
}

impl ParsedPdf {
    /// Page count used for quota enforcement
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Pages carrying extractable text
    pub fn text_pages(&self) -> impl Iterator<Item = &PageContent> {
        self.pages.iter().filter(|p| p.has_text())
    }
}

/// PDF parser built on lopdf
pub struct PdfParser;

impl PdfParser {
    /// Parse raw bytes into pages. `filename` is only used in error messages.
    ///
    /// Scanned documents parse successfully with empty pages; rejecting them
    /// is left to the caller so the page quota is checked first.
    pub fn parse(filename: &str, data: &[u8]) -> Result<ParsedPdf> {
        if !looks_like_pdf(data) {
            return Err(Error::UnsupportedContent(format!(
                "'{}' is not a PDF (missing %PDF header)",
                filename
            )));
        }

        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Failed to load PDF: {}", e)))?;

        let page_ids = doc.get_pages();
        if page_ids.is_empty() {
            return Err(Error::file_parse(filename, "PDF has no pages"));
        }

        let mut pages = Vec::with_capacity(page_ids.len());
        for (page_number, page_id) in page_ids {
            let text = match doc.extract_text(&[page_number]) {
                Ok(text) if !text.trim().is_empty() => text,
                Ok(_) => Self::extract_from_content_stream(&doc, page_id),
                Err(e) => {
                    tracing::debug!(
                        "[{}] lopdf text extraction failed on page {}: {}, scanning content stream",
                        filename,
                        page_number,
                        e
                    );
                    Self::extract_from_content_stream(&doc, page_id)
                }
            };

            pages.push(PageContent {
                page_number,
                content: cleanup_pdf_text(&text),
            });
        }

        Ok(ParsedPdf {
            pages,
            content_hash: hash_bytes(data),
        })
    }

    /// Fallback for pages whose fonts lopdf cannot decode
    fn extract_from_content_stream(doc: &lopdf::Document, page_id: lopdf::ObjectId) -> String {
        match doc.get_page_content(page_id) {
            Ok(content) => extract_text_from_content(&content),
            Err(e) => {
                tracing::debug!("Could not get content for page {:?}: {}", page_id, e);
                String::new()
            }
        }
    }
}

/// The header may be preceded by junk bytes; readers accept it within the first 1 KiB
fn looks_like_pdf(data: &[u8]) -> bool {
    let head = &data[..data.len().min(1024)];
    head.windows(5).any(|w| w == b"%PDF-")
}

/// Extract text from PDF content stream bytes between BT/ET operators
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;
    let mut current_text = String::new();

    for line in content_str.lines() {
        let line = line.trim();

        if line == "BT" {
            in_text_block = true;
            continue;
        }

        if line == "ET" {
            in_text_block = false;
            if !current_text.is_empty() {
                text.push_str(&current_text);
                text.push('\n');
                current_text.clear();
            }
            continue;
        }

        if in_text_block && (line.ends_with("Tj") || line.ends_with("TJ")) {
            if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
                if start < end {
                    let decoded = line[start + 1..end]
                        .replace("\\n", "\n")
                        .replace("\\r", "\r")
                        .replace("\\t", "\t")
                        .replace("\\(", "(")
                        .replace("\\)", ")")
                        .replace("\\\\", "\\");
                    current_text.push_str(&decoded);
                }
            }
        }
    }

    text
}

/// Normalise extracted text: ligatures, odd spaces, NULs, blank lines
fn cleanup_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace('\u{2010}', "-")
        .replace('\u{2011}', "-")
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Hash raw bytes for the ingest job record
fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
