//! Extracted documents and the session-scoped document cache.
//!
//! A [`Document`] is immutable once extracted. [`DocumentCache`] keeps at
//! most one of them, keyed by the SHA-256 digest of the source bytes, so
//! repeated requests against the same upload reuse the extraction and a
//! different upload replaces it.

use crate::config::PageRange;
use crate::error::StudyBotError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

/// One physical page with its extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    /// 1-indexed page number.
    pub number: usize,
    /// Extracted text; empty when the page has no text layer.
    pub text: String,
}

/// Document-level metadata read from the PDF Info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub pdf_version: String,
}

/// An extracted PDF.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    /// Where the bytes came from (path or URL), for messages.
    pub source: String,
    /// Hex SHA-256 of the source bytes.
    pub digest: String,
    pub metadata: DocumentMetadata,
    pages: Vec<Page>,
}

impl Document {
    /// Build a document from per-page text in physical order.
    ///
    /// Page numbers are assigned here, so they are always `1..=len`.
    pub fn from_page_texts(
        source: impl Into<String>,
        digest: impl Into<String>,
        metadata: DocumentMetadata,
        texts: Vec<String>,
    ) -> Self {
        let pages = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Page { number: i + 1, text })
            .collect();
        Self {
            source: source.into(),
            digest: digest.into(),
            metadata,
            pages,
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Pages in `range`, or a [`StudyBotError::Range`] if any is missing.
    pub fn select(&self, range: PageRange) -> Result<&[Page], StudyBotError> {
        range.validate(self.page_count())?;
        Ok(&self.pages[range.indices()])
    }

    /// Pages in `range`, or every page when `range` is `None`.
    pub fn select_or_all(&self, range: Option<PageRange>) -> Result<&[Page], StudyBotError> {
        match range {
            Some(r) => self.select(r),
            None => Ok(&self.pages),
        }
    }

    /// Number of pages whose text is empty after trimming.
    pub fn empty_page_count(&self) -> usize {
        self.pages.iter().filter(|p| p.text.trim().is_empty()).count()
    }
}

/// Hex-encoded SHA-256 of `bytes`; the identity of an upload.
pub fn digest_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Holds the current session's document.
#[derive(Debug, Default)]
pub struct DocumentCache {
    current: Option<Arc<Document>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached document if its digest matches.
    pub fn get(&self, digest: &str) -> Option<Arc<Document>> {
        self.current
            .as_ref()
            .filter(|doc| doc.digest == digest)
            .map(Arc::clone)
    }

    /// Replace the cached document, dropping any previous one.
    pub fn insert(&mut self, doc: Document) -> Arc<Document> {
        if let Some(old) = &self.current {
            if old.digest != doc.digest {
                debug!("Evicting cached document {}", old.source);
            }
        }
        let doc = Arc::new(doc);
        self.current = Some(Arc::clone(&doc));
        doc
    }

    pub fn current(&self) -> Option<Arc<Document>> {
        self.current.clone()
    }

    pub fn invalidate(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(texts: &[&str], digest: &str) -> Document {
        Document::from_page_texts(
            "test.pdf",
            digest,
            DocumentMetadata::default(),
            texts.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn page_numbers_are_contiguous_from_one() {
        let d = doc(&["a", "", "c", "d"], "h");
        let numbers: Vec<usize> = d.pages().iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(d.empty_page_count(), 1);
    }

    #[test]
    fn select_in_range() {
        let d = doc(&["a", "b", "c"], "h");
        let sel = d.select(PageRange::new(2, 3)).unwrap();
        assert_eq!(sel.len(), 2);
        assert_eq!(sel[0].text, "b");
        assert_eq!(sel[1].number, 3);
    }

    #[test]
    fn select_out_of_range_errors() {
        let d = doc(&["a"; 8], "h");
        let err = d.select(PageRange::new(10, 15)).unwrap_err();
        assert!(matches!(err, StudyBotError::Range { total: 8, .. }));
    }

    #[test]
    fn select_or_all_defaults_to_everything() {
        let d = doc(&["a", "b"], "h");
        assert_eq!(d.select_or_all(None).unwrap().len(), 2);
    }

    #[test]
    fn digest_is_stable_hex() {
        let a = digest_bytes(b"%PDF-1.7 hello");
        assert_eq!(a, digest_bytes(b"%PDF-1.7 hello"));
        assert_ne!(a, digest_bytes(b"%PDF-1.7 other"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn cache_hits_on_same_digest_and_invalidates_on_new() {
        let mut cache = DocumentCache::new();
        assert!(cache.get("one").is_none());

        cache.insert(doc(&["a"], "one"));
        assert!(cache.get("one").is_some());
        assert!(cache.get("two").is_none());

        cache.insert(doc(&["b", "c"], "two"));
        assert!(cache.get("one").is_none());
        assert_eq!(cache.get("two").unwrap().page_count(), 2);

        cache.invalidate();
        assert!(cache.current().is_none());
    }
}
