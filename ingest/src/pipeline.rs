//! End-to-end wiring: catalog -> orchestrator -> events -> storage.
//!
//! Finding zero trades is a successful (empty) run; only catalog parsing and
//! storage writes can fail the pipeline. A storage failure still reports how
//! many candidate trades the run produced.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use tracing::{info, warn};

use shared::{Chamber, CompanyRecord, TransactionEvent};

use crate::catalog::{filter_filings, parse_filing_index, FilingFilter};
use crate::events::{collect_company_records, to_event};
use crate::normalizer::Trade;
use crate::orchestrator::BatchOrchestrator;

/// Where canonical events land. Writes are upserts keyed on the event id, so
/// replays are harmless.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn upsert_events(&self, events: &[TransactionEvent]) -> Result<usize>;
    async fn upsert_companies(&self, companies: &[CompanyRecord]) -> Result<usize>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub trades_found: usize,
    pub inserted: usize,
}

#[derive(Debug)]
pub enum PipelineError {
    /// The filing index could not be parsed; nothing was processed.
    Catalog(anyhow::Error),
    /// Trades were produced but could not be stored.
    Storage { trades_found: usize, source: anyhow::Error },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Catalog(e) => write!(f, "filing index parse failed: {e}"),
            PipelineError::Storage { trades_found, source } => {
                write!(f, "storage write failed after finding {trades_found} trades: {source}")
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Catalog(e) => Some(e.as_ref()),
            PipelineError::Storage { source, .. } => Some(source.as_ref()),
        }
    }
}

/// Map trades into events and store them along with their company rows.
pub async fn store_trades(
    trades: &[Trade],
    chamber: Chamber,
    sink: &dyn EventSink,
) -> Result<IngestReport, PipelineError> {
    let trades_found = trades.len();
    if trades_found == 0 {
        info!("no trades found; nothing to store");
        return Ok(IngestReport { trades_found: 0, inserted: 0 });
    }

    let events: Vec<TransactionEvent> =
        trades.iter().map(|t| to_event(t, chamber, None)).collect();
    let companies = collect_company_records(&events);

    let inserted = sink
        .upsert_events(&events)
        .await
        .map_err(|source| PipelineError::Storage { trades_found, source })?;

    sink.upsert_companies(&companies)
        .await
        .map_err(|source| PipelineError::Storage { trades_found, source })?;

    info!("stored {inserted} of {trades_found} events ({} companies)", companies.len());
    Ok(IngestReport { trades_found, inserted })
}

/// Full House run over a raw filing index document.
pub async fn run_house_ingestion(
    index_xml: &str,
    filter: &FilingFilter,
    orchestrator: &BatchOrchestrator,
    sink: &dyn EventSink,
) -> Result<IngestReport, PipelineError> {
    let filings = parse_filing_index(index_xml).map_err(PipelineError::Catalog)?;
    let selected = filter_filings(&filings, filter);
    if selected.is_empty() {
        warn!("no filings matched the filter");
        return Ok(IngestReport { trades_found: 0, inserted: 0 });
    }

    let trades = orchestrator.process(selected).await;
    store_trades(&trades, Chamber::House, sink).await
}
