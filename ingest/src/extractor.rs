//! Extraction strategy selection per document classification.
//!
//! Table geometry lives behind the [`TableSource`] capability; this module
//! only decides which pages to look at and in which order to try strategies.
//! Every failure inside this stage is swallowed as "zero rows" because the
//! source documents vary too much in quality to fail a batch on one of them.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::parsing::clean_key;

/// Cleaned column-name -> cell text mapping for one extracted table row.
pub type RawRow = HashMap<String, String>;

/// Document classification from the external extraction capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    /// Periodic Transaction Report: trades only.
    Ptr,
    /// Annual Financial Disclosure: trades appear in a named sub-section.
    Fd,
    Unknown,
}

/// External table-extraction capability. Implementations wrap whatever PDF
/// machinery is available; the pipeline never sees page geometry.
pub trait TableSource: Send + Sync {
    fn classify(&self, document: &[u8]) -> Result<DocKind>;
    /// Extracted text per page, in page order.
    fn page_texts(&self, document: &[u8]) -> Result<Vec<String>>;
    /// Primary table strategy. `pages` restricts extraction when given.
    fn extract_tables(&self, document: &[u8], pages: Option<&[usize]>) -> Result<Vec<RawRow>>;
    /// Secondary strategy tried when the primary yields nothing.
    fn extract_tables_fallback(&self, document: &[u8]) -> Result<Vec<RawRow>>;
}

/// Per-batch classification memo keyed by document id. Two workers racing to
/// classify the same document both compute the same pure result, so last
/// write wins.
#[derive(Default)]
pub struct ClassificationCache {
    inner: Mutex<HashMap<String, DocKind>>,
}

impl ClassificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, doc_id: &str) -> Option<DocKind> {
        self.inner.lock().unwrap().get(doc_id).copied()
    }

    pub fn put(&self, doc_id: &str, kind: DocKind) {
        self.inner.lock().unwrap().insert(doc_id.to_string(), kind);
    }
}

pub struct RowExtractor<'a> {
    source: &'a dyn TableSource,
    cache: &'a ClassificationCache,
}

impl<'a> RowExtractor<'a> {
    pub fn new(source: &'a dyn TableSource, cache: &'a ClassificationCache) -> Self {
        Self { source, cache }
    }

    /// Pull raw rows out of a document. Never errors; a document we cannot
    /// read contributes zero rows.
    pub fn extract(&self, doc_id: &str, document: &[u8]) -> Vec<RawRow> {
        let kind = match self.cache.get(doc_id) {
            Some(kind) => kind,
            None => {
                let kind = self.source.classify(document).unwrap_or_else(|e| {
                    warn!("classification failed for {doc_id}: {e}");
                    DocKind::Unknown
                });
                self.cache.put(doc_id, kind);
                kind
            }
        };

        if kind == DocKind::Fd {
            let rows = self.extract_transaction_pages(document);
            if !rows.is_empty() {
                return rows;
            }
            debug!("no transaction-page rows in FD {doc_id}, trying whole document");
        }

        self.extract_whole_document(doc_id, document)
    }

    /// FD documents bury trades in a "Transactions" sub-section; restrict
    /// table extraction to pages whose text mentions it.
    fn extract_transaction_pages(&self, document: &[u8]) -> Vec<RawRow> {
        let texts = match self.source.page_texts(document) {
            Ok(texts) => texts,
            Err(e) => {
                debug!("page text extraction failed: {e}");
                return Vec::new();
            }
        };

        let pages: Vec<usize> = texts
            .iter()
            .enumerate()
            .filter(|(_, text)| text.to_lowercase().contains("transaction"))
            .map(|(index, _)| index)
            .collect();

        if pages.is_empty() {
            return Vec::new();
        }

        match self.source.extract_tables(document, Some(&pages)) {
            Ok(rows) => clean_rows(rows),
            Err(e) => {
                debug!("transaction-page extraction failed: {e}");
                Vec::new()
            }
        }
    }

    fn extract_whole_document(&self, doc_id: &str, document: &[u8]) -> Vec<RawRow> {
        let rows = match self.source.extract_tables(document, None) {
            Ok(rows) => clean_rows(rows),
            Err(e) => {
                debug!("primary table extraction failed for {doc_id}: {e}");
                Vec::new()
            }
        };
        if !rows.is_empty() {
            return rows;
        }

        match self.source.extract_tables_fallback(document) {
            Ok(rows) => clean_rows(rows),
            Err(e) => {
                debug!("fallback table extraction failed for {doc_id}: {e}");
                Vec::new()
            }
        }
    }
}

fn clean_rows(rows: Vec<RawRow>) -> Vec<RawRow> {
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(key, value)| (clean_key(&key), value.trim().to_string()))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    struct FakeSource {
        kind: DocKind,
        texts: Vec<String>,
        page_rows: Vec<RawRow>,
        whole_rows: Vec<RawRow>,
        fallback_rows: Vec<RawRow>,
        classify_calls: AtomicUsize,
        fail_everything: bool,
    }

    impl FakeSource {
        fn new(kind: DocKind) -> Self {
            Self {
                kind,
                texts: Vec::new(),
                page_rows: Vec::new(),
                whole_rows: Vec::new(),
                fallback_rows: Vec::new(),
                classify_calls: AtomicUsize::new(0),
                fail_everything: false,
            }
        }
    }

    impl TableSource for FakeSource {
        fn classify(&self, _document: &[u8]) -> Result<DocKind> {
            self.classify_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_everything {
                return Err(anyhow!("unreadable"));
            }
            Ok(self.kind)
        }

        fn page_texts(&self, _document: &[u8]) -> Result<Vec<String>> {
            if self.fail_everything {
                return Err(anyhow!("unreadable"));
            }
            Ok(self.texts.clone())
        }

        fn extract_tables(&self, _document: &[u8], pages: Option<&[usize]>) -> Result<Vec<RawRow>> {
            if self.fail_everything {
                return Err(anyhow!("unreadable"));
            }
            Ok(match pages {
                Some(_) => self.page_rows.clone(),
                None => self.whole_rows.clone(),
            })
        }

        fn extract_tables_fallback(&self, _document: &[u8]) -> Result<Vec<RawRow>> {
            if self.fail_everything {
                return Err(anyhow!("unreadable"));
            }
            Ok(self.fallback_rows.clone())
        }
    }

    #[test]
    fn test_fd_restricted_to_transaction_pages() {
        let mut source = FakeSource::new(DocKind::Fd);
        source.texts = vec!["Schedule A: Assets".to_string(), "Schedule B: Transactions".to_string()];
        source.page_rows = vec![row(&[("Asset", "Apple Inc. (AAPL)")])];
        source.whole_rows = vec![row(&[("other", "should not be used")])];

        let cache = ClassificationCache::new();
        let extractor = RowExtractor::new(&source, &cache);
        let rows = extractor.extract("doc1", b"pdf");
        assert_eq!(rows.len(), 1);
        // Keys come back cleaned.
        assert_eq!(rows[0].get("asset").unwrap(), "Apple Inc. (AAPL)");
    }

    #[test]
    fn test_fd_with_no_transaction_rows_falls_back_to_whole_document() {
        let mut source = FakeSource::new(DocKind::Fd);
        source.texts = vec!["Schedule B: Transactions".to_string()];
        source.page_rows = Vec::new();
        source.whole_rows = vec![row(&[("asset", "x")])];

        let cache = ClassificationCache::new();
        let extractor = RowExtractor::new(&source, &cache);
        assert_eq!(extractor.extract("doc1", b"pdf").len(), 1);
    }

    #[test]
    fn test_ptr_uses_secondary_strategy_when_primary_empty() {
        let mut source = FakeSource::new(DocKind::Ptr);
        source.whole_rows = Vec::new();
        source.fallback_rows = vec![row(&[("asset", "x")]), row(&[("asset", "y")])];

        let cache = ClassificationCache::new();
        let extractor = RowExtractor::new(&source, &cache);
        assert_eq!(extractor.extract("doc1", b"pdf").len(), 2);
    }

    #[test]
    fn test_capability_failures_yield_zero_rows() {
        let mut source = FakeSource::new(DocKind::Ptr);
        source.fail_everything = true;

        let cache = ClassificationCache::new();
        let extractor = RowExtractor::new(&source, &cache);
        assert!(extractor.extract("doc1", b"pdf").is_empty());
    }

    #[test]
    fn test_classification_cached_per_doc_id() {
        let source = FakeSource::new(DocKind::Ptr);
        let cache = ClassificationCache::new();
        let extractor = RowExtractor::new(&source, &cache);

        extractor.extract("doc1", b"pdf");
        extractor.extract("doc1", b"pdf");
        assert_eq!(source.classify_calls.load(Ordering::SeqCst), 1);

        extractor.extract("doc2", b"pdf");
        assert_eq!(source.classify_calls.load(Ordering::SeqCst), 2);
    }
}
