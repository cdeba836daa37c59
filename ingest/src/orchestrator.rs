//! Drives fetch -> extract -> normalize -> validate across many filings.
//!
//! Filings are independent, so they run on a bounded worker pool. A filing
//! that fails (download exhausted, worker panic) is logged and omitted; it
//! never aborts siblings or the batch. The aggregate result is
//! order-independent because identity is deterministic per trade.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::catalog::Filing;
use crate::extractor::{ClassificationCache, RowExtractor, TableSource};
use crate::fetcher::Fetcher;
use crate::normalizer::{RowNormalizer, Trade};
use crate::validator::validate;

pub const DEFAULT_CONCURRENCY: usize = 5;

pub struct BatchOrchestrator {
    fetcher: Arc<Fetcher>,
    source: Arc<dyn TableSource>,
    normalizer: Arc<RowNormalizer>,
    concurrency: usize,
    /// Finer-grained than the filing-level date filter: a filing's date need
    /// not equal its trades' dates, so trades are re-filtered after parsing.
    since_date: Option<NaiveDate>,
}

impl BatchOrchestrator {
    pub fn new(fetcher: Fetcher, source: Arc<dyn TableSource>, normalizer: RowNormalizer) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            source,
            normalizer: Arc::new(normalizer),
            concurrency: DEFAULT_CONCURRENCY,
            since_date: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_since_date(mut self, since: Option<NaiveDate>) -> Self {
        self.since_date = since;
        self
    }

    /// Process a batch of filings and return every validated trade found.
    pub async fn process(&self, filings: Vec<Filing>) -> Vec<Trade> {
        let total = filings.len();
        info!("processing {total} filings with concurrency {}", self.concurrency);

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let cache = Arc::new(ClassificationCache::new());
        let mut set = JoinSet::new();

        for filing in filings {
            let semaphore = semaphore.clone();
            let fetcher = self.fetcher.clone();
            let source = self.source.clone();
            let normalizer = self.normalizer.clone();
            let cache = cache.clone();

            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                process_filing(&filing, &fetcher, source.as_ref(), &normalizer, &cache).await
            });
        }

        let mut trades = Vec::new();
        while let Some(result) = set.join_next().await {
            match result {
                Ok(filing_trades) => trades.extend(filing_trades),
                // A panicked worker is isolated, not propagated.
                Err(e) => warn!("filing worker failed: {e}"),
            }
        }

        if let Some(since) = self.since_date {
            let before = trades.len();
            trades.retain(|t| t.date >= since);
            debug!("since-date filter kept {} of {before} trades", trades.len());
        }

        info!("batch produced {} trades from {total} filings", trades.len());
        trades
    }
}

async fn process_filing(
    filing: &Filing,
    fetcher: &Fetcher,
    source: &dyn TableSource,
    normalizer: &RowNormalizer,
    cache: &ClassificationCache,
) -> Vec<Trade> {
    let primary = filing.primary_url();
    let alternate = filing.alternate_url();

    let Some(document) = fetcher.fetch(&primary, &alternate, &filing.doc_id).await else {
        warn!("skipping filing {}: download failed", filing.doc_id);
        return Vec::new();
    };

    let extractor = RowExtractor::new(source, cache);
    let rows = extractor.extract(&filing.doc_id, &document);
    if rows.is_empty() {
        debug!("no table rows in filing {}", filing.doc_id);
        return Vec::new();
    }

    let actor = filing.full_name();
    let mut trades = Vec::new();
    for row in &rows {
        let line_no = trades.len() + 1;
        if let Some(trade) = normalizer.normalize(row, &filing.doc_id, &actor, line_no) {
            if validate(&trade) {
                trades.push(trade);
            }
        }
    }

    debug!("filing {} yielded {} trades from {} rows", filing.doc_id, trades.len(), rows.len());
    trades
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::RawRow;
    use crate::fetcher::{FetchOutcome, Transport};
    use crate::normalizer::house_config;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn filing(doc_id: &str, last: &str) -> Filing {
        Filing {
            first: "Test".to_string(),
            last: last.to_string(),
            filing_type: "P".to_string(),
            state_dst: "CA11".to_string(),
            year: 2024,
            filing_date: NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
            doc_id: doc_id.to_string(),
        }
    }

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    /// Transport that serves fixed bytes per URL substring, or always fails.
    struct MapTransport {
        ok: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for MapTransport {
        async fn get(&self, url: &str) -> FetchOutcome {
            self.calls.lock().unwrap().push(url.to_string());
            if self.ok.iter().any(|id| url.contains(id.as_str())) {
                FetchOutcome::Success(url.as_bytes().to_vec())
            } else {
                FetchOutcome::Failed("connection reset".to_string())
            }
        }
    }

    /// Table source that returns canned rows per doc id (documents carry
    /// their URL as bytes in these tests).
    struct MapSource {
        rows: HashMap<String, Vec<RawRow>>,
    }

    impl TableSource for MapSource {
        fn classify(&self, _document: &[u8]) -> Result<crate::extractor::DocKind> {
            Ok(crate::extractor::DocKind::Ptr)
        }

        fn page_texts(&self, _document: &[u8]) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn extract_tables(&self, document: &[u8], _pages: Option<&[usize]>) -> Result<Vec<RawRow>> {
            let url = String::from_utf8_lossy(document);
            for (doc_id, rows) in &self.rows {
                if url.contains(doc_id.as_str()) {
                    return Ok(rows.clone());
                }
            }
            Ok(Vec::new())
        }

        fn extract_tables_fallback(&self, _document: &[u8]) -> Result<Vec<RawRow>> {
            Ok(Vec::new())
        }
    }

    fn trade_row(date: &str, ticker_line: &str) -> RawRow {
        row(&[
            ("transaction date", date),
            ("transaction type", "P"),
            ("asset", ticker_line),
            ("amount", "$1,001 - $15,000"),
        ])
    }

    fn orchestrator_for(ok_docs: Vec<&str>, rows: Vec<(&str, Vec<RawRow>)>) -> BatchOrchestrator {
        let transport = Arc::new(MapTransport {
            ok: ok_docs.into_iter().map(str::to_string).collect(),
            calls: Mutex::new(Vec::new()),
        });
        let fetcher = Fetcher::new(transport, 1);
        let source = Arc::new(MapSource {
            rows: rows.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        });
        BatchOrchestrator::new(fetcher, source, RowNormalizer::new(house_config()))
            .with_concurrency(2)
    }

    #[tokio::test]
    async fn test_partial_failure_isolation() {
        // Filing doc2 always fails to download; doc1 and doc3 succeed.
        let orchestrator = orchestrator_for(
            vec!["doc1", "doc3"],
            vec![
                ("doc1", vec![trade_row("01/15/2024", "Apple Inc. (AAPL)")]),
                ("doc3", vec![trade_row("02/20/2024", "Microsoft Corp (MSFT)")]),
            ],
        );

        let filings = vec![filing("doc1", "One"), filing("doc2", "Two"), filing("doc3", "Three")];
        let mut trades = orchestrator.process(filings).await;
        trades.sort_by(|a, b| a.ticker.cmp(&b.ticker));

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].ticker, "AAPL");
        assert_eq!(trades[1].ticker, "MSFT");
    }

    #[tokio::test]
    async fn test_since_date_refilters_trades() {
        let orchestrator = orchestrator_for(
            vec!["doc1"],
            vec![(
                "doc1",
                vec![
                    trade_row("01/15/2024", "Apple Inc. (AAPL)"),
                    trade_row("03/15/2024", "Microsoft Corp (MSFT)"),
                ],
            )],
        )
        .with_since_date(NaiveDate::from_ymd_opt(2024, 2, 1));

        let trades = orchestrator.process(vec![filing("doc1", "One")]).await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].ticker, "MSFT");
    }

    #[tokio::test]
    async fn test_non_trade_rows_filtered_out() {
        let orchestrator = orchestrator_for(
            vec!["doc1"],
            vec![(
                "doc1",
                vec![
                    trade_row("01/15/2024", "Apple Inc. (AAPL)"),
                    row(&[
                        ("transaction date", "01/15/2024"),
                        ("type", "Salary"),
                        ("amount", "$1,000 - $15,000"),
                    ]),
                ],
            )],
        );

        let trades = orchestrator.process(vec![filing("doc1", "One")]).await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].actor, "Test One");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let orchestrator = orchestrator_for(vec![], vec![]);
        assert!(orchestrator.process(Vec::new()).await.is_empty());
    }
}
