//! House filing index parsing and filtering.
//!
//! The clerk publishes a yearly XML index whose repeating `<Member>` entries
//! carry filer name, filing type code, state/district, year, filing date and
//! document id. Entries missing required fields are dropped without error;
//! the source data is known to be imperfect.

use anyhow::Result;
use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use tracing::debug;

use crate::parsing::parse_date;

const DISCLOSURE_BASE: &str = "https://disclosures-clerk.house.gov/public_disc";

/// Filing type codes whose documents live under the PTR folder. Everything
/// else (annual FDs, amendments to them) lives under the financial folder.
const PTR_TYPE_CODES: &[&str] = &["W", "C", "D"];

/// One disclosure submission from the index. URL derivation is a pure
/// function of (year, doc id, filing type); no network state is stored here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filing {
    pub first: String,
    pub last: String,
    pub filing_type: String,
    pub state_dst: String,
    pub year: i32,
    pub filing_date: NaiveDate,
    pub doc_id: String,
}

impl Filing {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first, self.last).trim().to_string()
    }

    fn folder(&self) -> &'static str {
        if PTR_TYPE_CODES.contains(&self.filing_type.to_uppercase().as_str()) {
            "ptr-pdfs"
        } else {
            "financial-pdfs"
        }
    }

    fn alternate_folder(&self) -> &'static str {
        match self.folder() {
            "ptr-pdfs" => "financial-pdfs",
            _ => "ptr-pdfs",
        }
    }

    pub fn primary_url(&self) -> String {
        format!("{DISCLOSURE_BASE}/{}/{}/{}.pdf", self.folder(), self.year, self.doc_id)
    }

    /// Documents are occasionally filed under the other folder; a 404 on the
    /// primary URL is retried here once.
    pub fn alternate_url(&self) -> String {
        format!(
            "{DISCLOSURE_BASE}/{}/{}/{}.pdf",
            self.alternate_folder(),
            self.year,
            self.doc_id
        )
    }
}

/// Conjunctive filing predicates. `None` means "match all".
#[derive(Debug, Clone, Default)]
pub struct FilingFilter {
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    /// (last, first) pairs, matched case-insensitively.
    pub names: Option<Vec<(String, String)>>,
    pub filing_types: Option<Vec<String>>,
    pub states: Option<Vec<String>>,
}

/// Parse the financial disclosure XML index into filings.
pub fn parse_filing_index(xml: &str) -> Result<Vec<Filing>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut filings = Vec::new();
    let mut in_member = false;
    let mut field = String::new();
    let mut entry = IndexEntry::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "Member" {
                    in_member = true;
                    entry = IndexEntry::default();
                } else if in_member {
                    field = name;
                }
            }
            Event::Text(t) if in_member => {
                let value = t.unescape()?.trim().to_string();
                entry.set(&field, value);
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "Member" {
                    in_member = false;
                    match entry.build() {
                        Some(filing) => filings.push(filing),
                        None => debug!("dropping index entry with missing fields"),
                    }
                } else {
                    field.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(filings)
}

#[derive(Default)]
struct IndexEntry {
    first: String,
    last: String,
    filing_type: String,
    state_dst: String,
    year: String,
    filing_date: String,
    doc_id: String,
}

impl IndexEntry {
    fn set(&mut self, field: &str, value: String) {
        match field {
            "First" => self.first = value,
            "Last" => self.last = value,
            "FilingType" => self.filing_type = value,
            "StateDst" => self.state_dst = value,
            "Year" => self.year = value,
            "FilingDate" => self.filing_date = value,
            "DocID" => self.doc_id = value,
            _ => {}
        }
    }

    fn build(&self) -> Option<Filing> {
        if self.doc_id.is_empty() || self.year.is_empty() || self.filing_date.is_empty() {
            return None;
        }
        let year = self.year.parse::<i32>().ok()?;
        let filing_date = parse_date(&self.filing_date)?;
        Some(Filing {
            first: self.first.clone(),
            last: self.last.clone(),
            filing_type: self.filing_type.clone(),
            state_dst: self.state_dst.clone(),
            year,
            filing_date,
            doc_id: self.doc_id.clone(),
        })
    }
}

fn name_matches(filing: &Filing, names: &[(String, String)]) -> bool {
    let last_first = (filing.last.to_lowercase(), filing.first.to_lowercase());
    names
        .iter()
        .any(|(last, first)| (last.to_lowercase(), first.to_lowercase()) == last_first)
}

/// Apply all configured predicates. Pure function over its inputs.
pub fn filter_filings(filings: &[Filing], filter: &FilingFilter) -> Vec<Filing> {
    filings
        .iter()
        .filter(|f| filter.since.map_or(true, |since| f.filing_date >= since))
        .filter(|f| filter.until.map_or(true, |until| f.filing_date <= until))
        .filter(|f| filter.names.as_deref().map_or(true, |names| name_matches(f, names)))
        .filter(|f| {
            filter.filing_types.as_deref().map_or(true, |types| {
                types.iter().any(|t| t.eq_ignore_ascii_case(&f.filing_type))
            })
        })
        .filter(|f| {
            filter.states.as_deref().map_or(true, |states| {
                states
                    .iter()
                    .any(|s| f.state_dst.to_uppercase().starts_with(&s.to_uppercase()))
            })
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_INDEX: &str = r#"<?xml version="1.0"?>
<FinancialDisclosure>
  <Member>
    <First>Nancy</First>
    <Last>Pelosi</Last>
    <FilingType>P</FilingType>
    <StateDst>CA11</StateDst>
    <Year>2024</Year>
    <FilingDate>1/20/2024</FilingDate>
    <DocID>20024000123</DocID>
  </Member>
  <Member>
    <First>Dan</First>
    <Last>Crenshaw</Last>
    <FilingType>W</FilingType>
    <StateDst>TX02</StateDst>
    <Year>2024</Year>
    <FilingDate>3/5/2024</FilingDate>
    <DocID>20024000456</DocID>
  </Member>
  <Member>
    <First>Missing</First>
    <Last>DocId</Last>
    <FilingType>P</FilingType>
    <StateDst>NY01</StateDst>
    <Year>2024</Year>
    <FilingDate>2/2/2024</FilingDate>
    <DocID></DocID>
  </Member>
</FinancialDisclosure>"#;

    #[test]
    fn test_parse_index_drops_malformed_entries() {
        let filings = parse_filing_index(SAMPLE_INDEX).unwrap();
        assert_eq!(filings.len(), 2);
        assert_eq!(filings[0].last, "Pelosi");
        assert_eq!(filings[0].filing_date, NaiveDate::from_ymd_opt(2024, 1, 20).unwrap());
        assert_eq!(filings[1].doc_id, "20024000456");
    }

    #[test]
    fn test_url_derivation_by_filing_type() {
        let filings = parse_filing_index(SAMPLE_INDEX).unwrap();
        // P filings live under financial-pdfs, W under ptr-pdfs.
        assert_eq!(
            filings[0].primary_url(),
            "https://disclosures-clerk.house.gov/public_disc/financial-pdfs/2024/20024000123.pdf"
        );
        assert_eq!(
            filings[0].alternate_url(),
            "https://disclosures-clerk.house.gov/public_disc/ptr-pdfs/2024/20024000123.pdf"
        );
        assert_eq!(
            filings[1].primary_url(),
            "https://disclosures-clerk.house.gov/public_disc/ptr-pdfs/2024/20024000456.pdf"
        );
    }

    #[test]
    fn test_filter_by_name_case_insensitive() {
        let filings = parse_filing_index(SAMPLE_INDEX).unwrap();
        let filter = FilingFilter {
            names: Some(vec![("PELOSI".to_string(), "nancy".to_string())]),
            ..Default::default()
        };
        let kept = filter_filings(&filings, &filter);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].last, "Pelosi");
    }

    #[test]
    fn test_filter_by_date_window_and_type() {
        let filings = parse_filing_index(SAMPLE_INDEX).unwrap();
        let filter = FilingFilter {
            since: NaiveDate::from_ymd_opt(2024, 2, 1),
            filing_types: Some(vec!["w".to_string()]),
            ..Default::default()
        };
        let kept = filter_filings(&filings, &filter);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].filing_type, "W");

        let until_filter = FilingFilter {
            until: NaiveDate::from_ymd_opt(2024, 2, 1),
            ..Default::default()
        };
        assert_eq!(filter_filings(&filings, &until_filter).len(), 1);
    }

    #[test]
    fn test_filter_by_state() {
        let filings = parse_filing_index(SAMPLE_INDEX).unwrap();
        let filter = FilingFilter {
            states: Some(vec!["tx".to_string()]),
            ..Default::default()
        };
        let kept = filter_filings(&filings, &filter);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].state_dst, "TX02");
    }

    #[test]
    fn test_absent_filters_match_all() {
        let filings = parse_filing_index(SAMPLE_INDEX).unwrap();
        assert_eq!(filter_filings(&filings, &FilingFilter::default()).len(), 2);
    }
}
