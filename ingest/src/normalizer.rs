//! The central heuristic engine: turns raw extracted table rows into typed
//! trade candidates.
//!
//! Each step is a hard gate; the first failing gate drops the row. Disclosure
//! tables mix trades with income, liability and asset lines, so dropping is
//! the common case and never an error. All vocabularies are declarative
//! tables so ordering and coverage can be tested without touching control
//! flow.

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use shared::AssetType;
use std::sync::LazyLock;

use crate::extractor::RawRow;
use crate::parsing::{bucket_for, bucket_for_open, normalize_text, parse_amount_range, parse_date};

/// Multi-word exclusion phrases, matched as substrings of the row blob.
const EXCLUDE_PHRASES: &[&str] = &[
    "social security",
    "student loan",
    "car loan",
    "auto loan",
    "spouse salary",
    "consulting fee",
    "director fee",
    "speaking fee",
    "rental income",
    "book advance",
    "teaching fee",
];

/// Single-word exclusions, matched on word boundaries.
const EXCLUDE_WORDS: &[&str] = &[
    "salary",
    "wages",
    "freelance",
    "consult",
    "pension",
    "retirement",
    "mortgage",
    "loan",
    "credit",
    "liability",
    "debt",
    "royalty",
    "honoraria",
    "teaching",
    "revolving",
    "patreon",
    "youtube",
    "tiktok",
    "brand",
    "marketing",
    "bursar",
    "401k",
];

static EXCLUDE_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    let joined = EXCLUDE_WORDS.join("|");
    Regex::new(&format!(r"\b(?:{joined})\b")).unwrap()
});

/// Column synonyms, in lookup priority order.
const DATE_COLUMNS: &[&str] = &["date", "transaction date", "tx date", "trade date", "transaction dt"];
const ACTION_COLUMNS: &[&str] = &["transaction type", "type"];
const AMOUNT_COLUMNS: &[&str] = &["amount", "amount range", "value", "value of asset"];
const ASSET_COLUMNS: &[&str] = &["asset", "security", "company", "description"];
const OWNER_COLUMNS: &[&str] = &["owner", "ownership"];

/// Free text -> canonical action, first match wins. Longer variants sit above
/// their prefixes so "purchase" never half-matches as "buy" etc.
const ACTION_KEYWORDS: &[(&str, &str)] = &[
    ("purchase", "Buy"),
    ("bought", "Buy"),
    ("buy", "Buy"),
    ("sale", "Sell"),
    ("sold", "Sell"),
    ("sell", "Sell"),
    ("exchange", "Exchange"),
    ("exercise", "Exercise"),
    ("assignment", "Assignment"),
    ("expiration", "Expiration"),
    ("expire", "Expiration"),
    ("acquisition", "Acquire"),
    ("acquire", "Acquire"),
    ("disposition", "Dispose"),
    ("dispose", "Dispose"),
];

/// Single-letter codes used by PTR forms.
const ACTION_CODES: &[(&str, &str)] = &[("p", "Buy"), ("b", "Buy"), ("s", "Sell"), ("e", "Exchange")];

/// `Name (TICKER)` with an optional trailing `[TYPE]` tag.
static ASSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>.+?)\s*\((?P<ticker>[A-Z][A-Z0-9./\-]{0,9})\)\s*(?:\[[A-Z]{2,3}\])?\s*$")
        .unwrap()
});

static OPTION_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(call|put)s?\b").unwrap());
static OPTION_STRIKE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:strike(?:\s*price)?\s*(?:of\s*)?\$?([\d,]+(?:\.\d+)?)|\$([\d,]+(?:\.\d+)?)\s*strike)")
        .unwrap()
});
static OPTION_EXPIRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2}/\d{1,2}/\d{2,4})").unwrap());

const CRYPTO_SYMBOLS: &[&str] = &[
    "BTC", "ETH", "USDT", "BNB", "XRP", "USDC", "SOL", "ADA", "DOGE", "DOT", "MATIC", "SHIB",
    "LTC", "BCH", "LINK", "UNI",
];
const CRYPTO_KEYWORDS: &[&str] = &["bitcoin", "ethereum", "cryptocurrency", "crypto", "dogecoin", "litecoin", "solana"];
const FUND_KEYWORDS: &[&str] = &["mutual fund", "index fund", "money market"];
const BOND_KEYWORDS: &[&str] = &["bond", "treasury", "note"];
const ETF_KEYWORDS: &[&str] = &["etf", "exchange traded", "exchange-traded"];
const OPTION_KEYWORDS: &[&str] = &["option", "call", "put", "warrant"];

/// Option metadata attached to a trade when the asset text matches the
/// option pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionInfo {
    /// "call" or "put".
    pub option_type: String,
    pub strike: Option<f64>,
    pub expiry: Option<NaiveDate>,
}

/// One parsed transaction line, pre-validation.
#[derive(Debug, Clone, Serialize)]
pub struct Trade {
    /// Deterministic content hash; the basis for idempotent storage.
    pub event_uid: String,
    pub filing_id: String,
    pub actor: String,
    pub date: NaiveDate,
    pub action: String,
    pub owner: String,
    pub ticker: String,
    pub company: String,
    pub asset_type: AssetType,
    pub amount_range: String,
    pub amount_lo: i64,
    /// `None` for unbounded "over $X" disclosures.
    pub amount_hi: Option<i64>,
    pub amount_bucket: usize,
    pub option: Option<OptionInfo>,
    /// Original extracted row, kept for audit.
    pub raw: RawRow,
}

/// Immutable per-chamber configuration for the normalizer.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Mixed into every fingerprint so chambers never collide.
    pub source_tag: &'static str,
    /// Ascending inclusive bucket table for this chamber.
    pub buckets: &'static [(i64, i64)],
}

pub struct RowNormalizer {
    config: NormalizerConfig,
}

impl RowNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Run the row through the gate sequence. `None` means the row is not a
    /// trade (or not parseable as one) and should be skipped silently.
    pub fn normalize(&self, row: &RawRow, filing_id: &str, actor: &str, line_no: usize) -> Option<Trade> {
        if is_excluded(row) {
            return None;
        }

        let date = first_value(row, DATE_COLUMNS).and_then(|v| parse_date(v))?;

        let action = first_value(row, ACTION_COLUMNS).and_then(parse_action)?;

        let amount_raw = first_value(row, AMOUNT_COLUMNS)?;
        let (lo, hi) = parse_amount_range(amount_raw)?;
        let bucket = match hi {
            Some(hi) => bucket_for(self.config.buckets, lo, hi),
            None => bucket_for_open(self.config.buckets, lo),
        };

        let asset_text = first_value(row, ASSET_COLUMNS).map(normalize_text)?;
        let (company, ticker, option) = parse_asset(&asset_text);
        if company.is_empty() && ticker.is_empty() {
            return None;
        }

        let asset_type = classify_asset_type(&asset_text, &ticker, option.is_some());
        let owner = first_value(row, OWNER_COLUMNS).map(normalize_text).unwrap_or_default();

        let key_asset = if ticker.is_empty() { company.as_str() } else { ticker.as_str() };
        let event_uid = fingerprint(
            self.config.source_tag,
            filing_id,
            line_no,
            key_asset,
            &date.to_string(),
            amount_raw,
            &action,
        );

        Some(Trade {
            event_uid,
            filing_id: filing_id.to_string(),
            actor: actor.to_string(),
            date,
            action,
            owner,
            ticker,
            company,
            asset_type,
            amount_range: normalize_text(amount_raw),
            amount_lo: lo,
            amount_hi: hi,
            amount_bucket: bucket,
            option,
            raw: row.clone(),
        })
    }
}

/// First non-empty cell among the synonym columns, in priority order.
fn first_value<'r>(row: &'r RawRow, keys: &[&str]) -> Option<&'r str> {
    keys.iter()
        .filter_map(|key| row.get(*key))
        .map(|v| v.as_str())
        .find(|v| !v.trim().is_empty())
}

/// Income/liability/asset-disclosure lines are not trades; one excluded
/// token anywhere in the row kills it.
fn is_excluded(row: &RawRow) -> bool {
    let blob = row
        .values()
        .map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    EXCLUDE_PHRASES.iter().any(|phrase| blob.contains(phrase)) || EXCLUDE_WORD_RE.is_match(&blob)
}

/// Canonicalize a free-text action. Single-letter codes are checked before
/// the keyword table.
fn parse_action(raw: &str) -> Option<String> {
    let text = normalize_text(raw).to_lowercase();
    if text.is_empty() {
        return None;
    }

    for (code, canonical) in ACTION_CODES {
        if text == *code {
            return Some((*canonical).to_string());
        }
    }

    for (keyword, canonical) in ACTION_KEYWORDS {
        if text.contains(keyword) {
            return Some((*canonical).to_string());
        }
    }

    None
}

/// Split an asset description into (company, ticker, option metadata).
///
/// When the text matches the option pattern, metadata is captured and the
/// asset pattern is re-run against the underlying text.
fn parse_asset(text: &str) -> (String, String, Option<OptionInfo>) {
    let option = parse_option(text);

    let target = match &option {
        Some((underlying, _)) => underlying.as_str(),
        None => text,
    };

    let (company, ticker) = match ASSET_RE.captures(target) {
        Some(caps) => (
            normalize_text(caps.name("name").map_or("", |m| m.as_str())),
            caps.name("ticker").map_or(String::new(), |m| m.as_str().to_string()),
        ),
        None => (normalize_text(target), String::new()),
    };

    (company, ticker, option.map(|(_, info)| info))
}

/// Detect an option line: underlying + call/put + optional strike/expiry.
/// Returns the underlying text and the parsed metadata.
fn parse_option(text: &str) -> Option<(String, OptionInfo)> {
    let type_match = OPTION_TYPE_RE.find(text)?;
    let option_type = text[type_match.range()]
        .to_lowercase()
        .trim_end_matches('s')
        .to_string();

    let strike = OPTION_STRIKE_RE.captures(text).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
    });

    let expiry = OPTION_EXPIRY_RE
        .captures(text)
        .and_then(|caps| parse_date(&caps[1]));

    let underlying = text[..type_match.start()].trim().to_string();
    Some((underlying, OptionInfo { option_type, strike, expiry }))
}

/// Ordered asset classification, first match wins:
/// OPTION -> CRYPTO -> MUTUAL_FUND -> BOND -> ETF -> STOCK -> OTHER.
fn classify_asset_type(text: &str, ticker: &str, has_option: bool) -> AssetType {
    let lower = text.to_lowercase();
    let ticker_upper = ticker.to_uppercase();

    if has_option || OPTION_KEYWORDS.iter().any(|kw| contains_word(&lower, kw)) {
        return AssetType::Option;
    }
    if CRYPTO_SYMBOLS.contains(&ticker_upper.as_str())
        || CRYPTO_KEYWORDS.iter().any(|kw| lower.contains(kw))
    {
        return AssetType::Crypto;
    }
    if FUND_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return AssetType::MutualFund;
    }
    if BOND_KEYWORDS.iter().any(|kw| contains_word(&lower, kw)) {
        return AssetType::Bond;
    }
    if ETF_KEYWORDS.iter().any(|kw| lower.contains(kw))
        || (ticker_upper.len() == 4 && ticker_upper.ends_with('F'))
    {
        return AssetType::Etf;
    }
    if !ticker_upper.is_empty() {
        return AssetType::Stock;
    }
    AssetType::Other
}

/// Word-boundary containment without building a regex per keyword.
fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.split(|c: char| !c.is_alphanumeric()).any(|token| token == word)
}

/// Content fingerprint: identity is a pure function of the row plus its
/// position, so re-running extraction yields identical ids.
fn fingerprint(
    source: &str,
    filing_id: &str,
    line_no: usize,
    asset_key: &str,
    date_iso: &str,
    amount_raw: &str,
    action: &str,
) -> String {
    let key = format!("{source}|{filing_id}|{line_no}|{asset_key}|{date_iso}|{amount_raw}|{action}");
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// House-chamber normalizer configuration.
pub fn house_config() -> NormalizerConfig {
    NormalizerConfig {
        source_tag: shared::Chamber::House.source_tag(),
        buckets: crate::parsing::HOUSE_AMOUNT_BUCKETS,
    }
}

/// Senate-chamber normalizer configuration: same gates, wider bucket table,
/// separate fingerprint namespace.
pub fn senate_config() -> NormalizerConfig {
    NormalizerConfig {
        source_tag: shared::Chamber::Senate.source_tag(),
        buckets: crate::parsing::SENATE_AMOUNT_BUCKETS,
    }
}
