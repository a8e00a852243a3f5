//! Text extraction: PDF bytes → per-page plain text via `lopdf`.
//!
//! Opening the document is fail-fast: a buffer `lopdf` cannot parse, or one
//! with no pages, is an [`StudyBotError::Extraction`]. Individual pages are
//! best-effort: a page whose content stream cannot be decoded (a scanned
//! image, an exotic font encoding) contributes an empty string and a warning
//! rather than sinking the whole book.
//!
//! Parsing is CPU-bound, so [`extract_document`] moves it onto the blocking
//! pool with `spawn_blocking`.

use crate::document::{digest_bytes, Document, DocumentMetadata};
use crate::error::StudyBotError;
use lopdf::{Dictionary, Object};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract every page of `bytes` into a [`Document`].
pub async fn extract_document(source: &str, bytes: Vec<u8>) -> Result<Document, StudyBotError> {
    let source_owned = source.to_string();
    tokio::task::spawn_blocking(move || extract_document_blocking(&source_owned, &bytes))
        .await
        .map_err(|e| StudyBotError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of [`extract_document`].
pub fn extract_document_blocking(source: &str, bytes: &[u8]) -> Result<Document, StudyBotError> {
    let start = Instant::now();
    let digest = digest_bytes(bytes);

    let doc = lopdf::Document::load_mem(bytes).map_err(|e| StudyBotError::Extraction {
        source_name: source.to_string(),
        detail: e.to_string(),
    })?;

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(StudyBotError::Extraction {
            source_name: source.to_string(),
            detail: "document has no pages".to_string(),
        });
    }

    // get_pages is keyed by 1-based page number in document order
    let mut texts = Vec::with_capacity(pages.len());
    for &page_num in pages.keys() {
        let text = match doc.extract_text(&[page_num]) {
            Ok(t) => t.trim_end().to_string(),
            Err(e) => {
                warn!("Page {}: no extractable text ({})", page_num, e);
                String::new()
            }
        };
        if text.is_empty() {
            debug!("Page {}: empty text layer", page_num);
        }
        texts.push(text);
    }

    let metadata = read_metadata(&doc);
    let document = Document::from_page_texts(source, digest, metadata, texts);

    info!(
        "Extracted {} pages ({} empty) from {} in {}ms",
        document.page_count(),
        document.empty_page_count(),
        source,
        start.elapsed().as_millis()
    );
    Ok(document)
}

/// Read title/author/subject from the trailer's Info dictionary.
fn read_metadata(doc: &lopdf::Document) -> DocumentMetadata {
    let info: Option<&Dictionary> = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };

    let field = |key: &[u8]| -> Option<String> {
        let obj = info?.get(key).ok()?;
        let value = match obj {
            Object::String(bytes, _) => decode_pdf_string(bytes),
            _ => return None,
        };
        let value = value.trim().to_string();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    };

    DocumentMetadata {
        title: field(b"Title"),
        author: field(b"Author"),
        subject: field(b"Subject"),
        pdf_version: doc.version.clone(),
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, otherwise byte-wise.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}
