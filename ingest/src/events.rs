//! Mapping chamber-specific trades into canonical transaction events.
//!
//! Identity is a UUIDv5 derived from a stable namespace plus the chamber tag
//! and the trade's own content fingerprint, so ids are stable across
//! re-ingestion and never collide between chambers.

use shared::{Chamber, CompanyRecord, TransactionEvent};
use std::collections::HashMap;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::normalizer::Trade;
use crate::parsing::normalize_text;

static EVENT_NAMESPACE: LazyLock<Uuid> = LazyLock::new(|| {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, b"https://congress-trades/transaction-event")
});

/// Buy-family keywords are checked before sell-family; first match wins.
const BUY_KEYWORDS: &[&str] = &["buy", "purchase", "acquire", "acquisition", "bought"];
const SELL_KEYWORDS: &[&str] = &["sell", "sale", "dispose", "disposition", "sold"];

/// Map a free-form action onto exactly `buy`, `sell` or `other`.
pub fn canonicalize_transaction_type(raw: &str) -> String {
    let text = normalize_text(raw).to_lowercase();
    if text.is_empty() {
        return "other".to_string();
    }
    if BUY_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        return "buy".to_string();
    }
    if SELL_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        return "sell".to_string();
    }
    "other".to_string()
}

fn blank_to_none(value: &str) -> Option<String> {
    let text = normalize_text(value);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Tickers are stored uppercase with punctuation artifacts stripped; only
/// alphanumerics plus `.` and `-` survive.
fn normalize_ticker(value: &str) -> Option<String> {
    let text = blank_to_none(value)?;
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '.' || *c == '-')
        .collect::<String>()
        .to_uppercase();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn deterministic_id(chamber: Chamber, fingerprint: &str) -> Uuid {
    let token = format!("{}:{}", chamber.source_tag(), fingerprint);
    Uuid::new_v5(&EVENT_NAMESPACE, token.as_bytes())
}

/// Build the canonical event for a parsed trade.
pub fn to_event(trade: &Trade, chamber: Chamber, politician_id: Option<&str>) -> TransactionEvent {
    TransactionEvent {
        id: deterministic_id(chamber, &trade.event_uid),
        politician_id: politician_id.map(str::to_string),
        filing_id: blank_to_none(&trade.filing_id),
        transaction_date: Some(trade.date),
        ticker: normalize_ticker(&trade.ticker),
        company_name: blank_to_none(&trade.company),
        transaction_type: canonicalize_transaction_type(&trade.action),
        amount_range: blank_to_none(&trade.amount_range),
        amount_lo: Some(trade.amount_lo),
        amount_hi: trade.amount_hi,
        owner: blank_to_none(&trade.owner),
    }
}

/// Fold events into company reference rows: one row per ticker, keeping the
/// first non-empty display name encountered.
pub fn collect_company_records(events: &[TransactionEvent]) -> Vec<CompanyRecord> {
    let mut order: Vec<String> = Vec::new();
    let mut companies: HashMap<String, CompanyRecord> = HashMap::new();

    for event in events {
        let Some(ticker) = &event.ticker else {
            continue;
        };

        match companies.get_mut(ticker) {
            None => {
                order.push(ticker.clone());
                companies.insert(
                    ticker.clone(),
                    CompanyRecord {
                        ticker: ticker.clone(),
                        name: event.company_name.clone(),
                        sector: None,
                        industry: None,
                    },
                );
            }
            Some(existing) => {
                if existing.name.is_none() && event.company_name.is_some() {
                    existing.name = event.company_name.clone();
                }
            }
        }
    }

    order.into_iter().filter_map(|ticker| companies.remove(&ticker)).collect()
}
