//! Senate transactions from the aggregate JSON feed.
//!
//! The Senate side arrives pre-tabulated (one JSON object per transaction),
//! so rows are rebuilt as column mappings and pushed through the same
//! normalizer gates as House rows, just with the Senate bucket table and
//! fingerprint namespace.

use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::info;

use crate::extractor::RawRow;
use crate::normalizer::{senate_config, RowNormalizer, Trade};
use crate::validator::validate;

static REPORT_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/(\d+)/?$").unwrap());

/// One row of the aggregate Senate transaction feed.
#[derive(Debug, Clone, Deserialize)]
pub struct SenateFeedRow {
    pub transaction_date: Option<String>,
    pub owner: Option<String>,
    pub ticker: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub amount: Option<String>,
    pub asset_description: Option<String>,
    pub senator: Option<String>,
    pub ptr_link: Option<String>,
    pub disclosure_date: Option<String>,
}

pub fn parse_senate_feed(json: &str) -> Result<Vec<SenateFeedRow>> {
    let rows: Vec<SenateFeedRow> = serde_json::from_str(json)?;
    Ok(rows)
}

/// Report id from a PTR link like `.../view/paper/12345/`; falls back to the
/// whole link so rows without a recognizable id still group consistently.
fn report_id(ptr_link: &str) -> String {
    REPORT_ID_RE
        .captures(ptr_link)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| ptr_link.to_string())
}

fn feed_row_to_raw(row: &SenateFeedRow) -> RawRow {
    let mut raw: RawRow = HashMap::new();
    if let Some(date) = &row.transaction_date {
        raw.insert("transaction date".to_string(), date.clone());
    }
    if let Some(action) = &row.transaction_type {
        raw.insert("transaction type".to_string(), action.clone());
    }
    if let Some(amount) = &row.amount {
        raw.insert("amount".to_string(), amount.clone());
    }
    if let Some(owner) = &row.owner {
        raw.insert("owner".to_string(), owner.clone());
    }

    // The feed carries ticker and description separately; rebuild the
    // `Name (TICKER)` shape the asset gate expects. "--" means no ticker.
    let description = row.asset_description.clone().unwrap_or_default();
    let ticker = row
        .ticker
        .clone()
        .map(|t| t.replace("--", ""))
        .unwrap_or_default();
    let asset = if ticker.trim().is_empty() {
        description
    } else if description.trim().is_empty() {
        ticker.trim().to_string()
    } else {
        format!("{} ({})", description.trim(), ticker.trim())
    };
    if !asset.trim().is_empty() {
        raw.insert("asset".to_string(), asset);
    }

    raw
}

/// Normalize and validate the whole feed into Senate trade candidates.
pub fn trades_from_feed(rows: &[SenateFeedRow]) -> Vec<Trade> {
    let normalizer = RowNormalizer::new(senate_config());
    let mut line_counters: HashMap<String, usize> = HashMap::new();
    let mut trades = Vec::new();

    for row in rows {
        let filing_id = row.ptr_link.as_deref().map(report_id).unwrap_or_default();
        if filing_id.is_empty() {
            continue;
        }
        let actor = row.senator.clone().unwrap_or_default();

        let line_no = line_counters.entry(filing_id.clone()).or_insert(0);
        *line_no += 1;

        let raw = feed_row_to_raw(row);
        if let Some(trade) = normalizer.normalize(&raw, &filing_id, &actor, *line_no) {
            if validate(&trade) {
                trades.push(trade);
            }
        }
    }

    info!("senate feed: {} trades from {} rows", trades.len(), rows.len());
    trades
}
