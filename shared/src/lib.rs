//! Shared data model for the disclosure ingestion pipeline
//! Canonical transaction events, company reference rows, and runtime config

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Which chamber a filing came from. Events are namespaced per chamber so
/// House and Senate ids never collide and are never deduped against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chamber {
    House,
    Senate,
}

impl Chamber {
    /// Stable tag mixed into row fingerprints and UUID namespaces.
    pub fn source_tag(&self) -> &'static str {
        match self {
            Chamber::House => "house_ptr",
            Chamber::Senate => "senate",
        }
    }
}

/// Asset classification for a parsed trade line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Stock,
    Etf,
    Option,
    Crypto,
    MutualFund,
    Bond,
    Other,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Stock => "STOCK",
            AssetType::Etf => "ETF",
            AssetType::Option => "OPTION",
            AssetType::Crypto => "CRYPTO",
            AssetType::MutualFund => "MUTUAL_FUND",
            AssetType::Bond => "BOND",
            AssetType::Other => "OTHER",
        }
    }
}

/// Canonical, chamber-agnostic record handed to the storage collaborator.
/// Immutable once built; `id` is deterministic so upserts are idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub id: Uuid,
    pub politician_id: Option<String>,
    pub filing_id: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub ticker: Option<String>,
    pub company_name: Option<String>,
    /// Exactly "buy", "sell" or "other".
    pub transaction_type: String,
    pub amount_range: Option<String>,
    pub amount_lo: Option<i64>,
    pub amount_hi: Option<i64>,
    pub owner: Option<String>,
}

impl TransactionEvent {
    /// Serialize into the upsert payload shape used by the store.
    pub fn to_record(&self) -> serde_json::Value {
        json!({
            "id": self.id.to_string(),
            "politician_id": self.politician_id,
            "filing_id": self.filing_id,
            "transaction_date": self.transaction_date.map(|d| d.to_string()),
            "ticker": self.ticker,
            "company_name": self.company_name,
            "transaction_type": self.transaction_type,
            "amount_range": self.amount_range,
            "amount_lo": self.amount_lo,
            "amount_hi": self.amount_hi,
            "owner": self.owner,
        })
    }
}

/// Ticker -> best-known display name, upserted into the company reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

impl CompanyRecord {
    pub fn to_record(&self) -> serde_json::Value {
        json!({
            "ticker": self.ticker,
            "name": self.name,
            "sector": self.sector,
            "industry": self.industry,
        })
    }
}

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// House clerk financial disclosure index (XML bundle).
    pub index_url: String,
    /// Aggregate Senate transaction feed (JSON).
    pub senate_feed_url: String,
    /// Bounded worker pool size for filing processing.
    pub concurrency: usize,
    /// Per-URL download attempt ceiling.
    pub retry_attempts: u32,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let concurrency = match std::env::var("INGEST_CONCURRENCY") {
            Ok(v) => v.parse::<usize>().context("INGEST_CONCURRENCY must be a number")?,
            Err(_) => 5,
        };
        let retry_attempts = match std::env::var("INGEST_RETRY_ATTEMPTS") {
            Ok(v) => v.parse::<u32>().context("INGEST_RETRY_ATTEMPTS must be a number")?,
            Err(_) => 3,
        };

        Ok(Self {
            index_url: std::env::var("HOUSE_INDEX_URL").unwrap_or_else(|_| {
                "https://disclosures-clerk.house.gov/public_disc/financial-pdfs/2025FD.zip"
                    .to_string()
            }),
            senate_feed_url: std::env::var("SENATE_FEED_URL").unwrap_or_else(|_| {
                "https://raw.githubusercontent.com/timothycarambat/senate-stock-watcher-data/master/aggregate/all_transactions.json"
                    .to_string()
            }),
            concurrency,
            retry_attempts,
            request_timeout_secs: 30,
        })
    }
}
