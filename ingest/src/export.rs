//! File exports for trade candidates: a JSON dump, a flat CSV, and a small
//! summary document for eyeballing a run.

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::Write;
use tracing::info;

use crate::normalizer::Trade;

/// Column order is fixed so diffs between runs stay readable.
const CSV_COLUMNS: &[&str] = &[
    "date",
    "actor",
    "action",
    "ticker",
    "company",
    "asset_type",
    "amount_lo",
    "amount_hi",
    "amount_range",
    "owner",
    "filing_id",
    "event_uid",
];

pub fn trades_to_json(trades: &[Trade]) -> Result<String> {
    serde_json::to_string_pretty(trades).context("serializing trades to JSON")
}

pub fn write_trades_csv<W: Write>(writer: W, trades: &[Trade]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_COLUMNS)?;

    for trade in trades {
        csv.write_record(&[
            trade.date.format("%Y-%m-%d").to_string(),
            trade.actor.clone(),
            trade.action.clone(),
            trade.ticker.clone(),
            trade.company.clone(),
            trade.asset_type.as_str().to_string(),
            trade.amount_lo.to_string(),
            trade.amount_hi.map(|hi| hi.to_string()).unwrap_or_default(),
            trade.amount_range.clone(),
            trade.owner.clone(),
            trade.filing_id.clone(),
            trade.event_uid.clone(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

/// Gzip-compressed column-oriented export: one array per column, columns in
/// the same order as the CSV. Pure serialization of the trade fields.
pub fn write_trades_columnar<W: Write>(writer: W, trades: &[Trade]) -> Result<()> {
    let doc = json!({
        "rows": trades.len(),
        "columns": {
            "date": trades.iter().map(|t| t.date.format("%Y-%m-%d").to_string()).collect::<Vec<_>>(),
            "actor": trades.iter().map(|t| t.actor.as_str()).collect::<Vec<_>>(),
            "action": trades.iter().map(|t| t.action.as_str()).collect::<Vec<_>>(),
            "ticker": trades.iter().map(|t| t.ticker.as_str()).collect::<Vec<_>>(),
            "company": trades.iter().map(|t| t.company.as_str()).collect::<Vec<_>>(),
            "asset_type": trades.iter().map(|t| t.asset_type.as_str()).collect::<Vec<_>>(),
            "amount_lo": trades.iter().map(|t| t.amount_lo).collect::<Vec<_>>(),
            "amount_hi": trades.iter().map(|t| t.amount_hi).collect::<Vec<_>>(),
            "amount_range": trades.iter().map(|t| t.amount_range.as_str()).collect::<Vec<_>>(),
            "owner": trades.iter().map(|t| t.owner.as_str()).collect::<Vec<_>>(),
            "filing_id": trades.iter().map(|t| t.filing_id.as_str()).collect::<Vec<_>>(),
            "event_uid": trades.iter().map(|t| t.event_uid.as_str()).collect::<Vec<_>>(),
        },
    });

    let mut encoder = GzEncoder::new(writer, Compression::default());
    serde_json::to_writer(&mut encoder, &doc).context("serializing columnar export")?;
    encoder.finish()?;
    Ok(())
}

/// Aggregate counts for a batch of trades.
pub fn summary_stats(trades: &[Trade]) -> Value {
    let mut actors: Vec<&str> = trades.iter().map(|t| t.actor.as_str()).collect();
    actors.sort_unstable();
    actors.dedup();

    let mut tickers: Vec<&str> = trades
        .iter()
        .map(|t| t.ticker.as_str())
        .filter(|t| !t.is_empty())
        .collect();
    tickers.sort_unstable();
    tickers.dedup();

    let mut by_action: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_asset_type: BTreeMap<String, usize> = BTreeMap::new();
    for trade in trades {
        *by_action.entry(trade.action.clone()).or_insert(0) += 1;
        *by_asset_type.entry(trade.asset_type.as_str().to_string()).or_insert(0) += 1;
    }

    let earliest = trades.iter().map(|t| t.date).min();
    let latest = trades.iter().map(|t| t.date).max();

    info!("summary: {} trades, {} actors, {} tickers", trades.len(), actors.len(), tickers.len());

    json!({
        "total_trades": trades.len(),
        "unique_actors": actors.len(),
        "unique_tickers": tickers.len(),
        "date_range": {
            "earliest": earliest.map(|d| d.format("%Y-%m-%d").to_string()),
            "latest": latest.map(|d| d.format("%Y-%m-%d").to_string()),
        },
        "by_action": by_action,
        "by_asset_type": by_asset_type,
    })
}
