//! Congressional trade ingestion runner.
//! Pulls the Senate aggregate feed, normalizes it into trade candidates, and
//! writes JSON/CSV exports plus a run summary. The House filing index is
//! fetched and filtered so the candidate filings are listed alongside.

use anyhow::{Context, Result};
use std::fs;
use tracing::{info, warn};

use disclosure_ingest::catalog::{filter_filings, parse_filing_index, FilingFilter};
use disclosure_ingest::export::{summary_stats, trades_to_json, write_trades_columnar, write_trades_csv};
use disclosure_ingest::fetcher::{FetchOutcome, HttpTransport, Transport};
use disclosure_ingest::senate::{parse_senate_feed, trades_from_feed};
use shared::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("🚀 Starting congressional trade ingestion");

    let config = Config::from_env()?;
    info!("✅ Configuration loaded");

    let transport = HttpTransport::new(config.request_timeout_secs)?;

    // Senate side: the aggregate feed is already tabular, so it runs through
    // the normalizer directly.
    match transport.get(&config.senate_feed_url).await {
        FetchOutcome::Success(bytes) => {
            let body = String::from_utf8_lossy(&bytes);
            let rows = parse_senate_feed(&body).context("parsing senate feed")?;
            let trades = trades_from_feed(&rows);
            info!("🏛️ Senate feed: {} trades", trades.len());

            fs::write("senate_trades.json", trades_to_json(&trades)?)?;
            let csv_file = fs::File::create("senate_trades.csv")?;
            write_trades_csv(csv_file, &trades)?;
            let columnar_file = fs::File::create("senate_trades.columnar.json.gz")?;
            write_trades_columnar(columnar_file, &trades)?;
            fs::write(
                "senate_summary.json",
                serde_json::to_string_pretty(&summary_stats(&trades))?,
            )?;
            info!("💾 Wrote senate trade exports (json, csv, columnar gzip, summary)");
        }
        other => warn!("senate feed unavailable: {other:?}"),
    }

    // House side: list the PTR filings that a downstream document-extraction
    // run would process.
    match transport.get(&config.index_url).await {
        FetchOutcome::Success(bytes) => {
            let xml = String::from_utf8_lossy(&bytes);
            // The published index is sometimes a zip bundle rather than bare
            // XML; an unparseable body is reported, not fatal.
            match parse_filing_index(&xml) {
                Ok(filings) => {
                    let filter = FilingFilter {
                        filing_types: Some(vec!["P".to_string()]),
                        ..Default::default()
                    };
                    let ptrs = filter_filings(&filings, &filter);
                    info!("📄 House index: {} periodic transaction reports", ptrs.len());
                    for filing in ptrs.iter().take(10) {
                        info!("  {} {} -> {}", filing.filing_date, filing.full_name(), filing.primary_url());
                    }
                }
                Err(e) => warn!("house index not parseable as XML: {e}"),
            }
        }
        other => warn!("house index unavailable: {other:?}"),
    }

    info!("🎉 Ingestion run complete");
    Ok(())
}
