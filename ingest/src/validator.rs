//! Sanity bounds for trade candidates. Validation only filters; it never
//! raises and never mutates.

use chrono::{NaiveDate, Utc};
use tracing::debug;

use crate::normalizer::Trade;

/// Disclosures predating electronic filing are treated as noise.
const EARLIEST_TRADE_DATE: (i32, u32, u32) = (1990, 1, 1);

/// Reject trades with impossible dates, inverted amount bounds, or no asset
/// identity at all.
pub fn validate(trade: &Trade) -> bool {
    let today = Utc::now().date_naive();
    let floor = NaiveDate::from_ymd_opt(EARLIEST_TRADE_DATE.0, EARLIEST_TRADE_DATE.1, EARLIEST_TRADE_DATE.2)
        .expect("static date");

    if trade.date > today {
        debug!("rejecting trade {}: future date {}", trade.event_uid, trade.date);
        return false;
    }
    if trade.date < floor {
        debug!("rejecting trade {}: date {} before {}", trade.event_uid, trade.date, floor);
        return false;
    }
    if let Some(hi) = trade.amount_hi {
        if trade.amount_lo > hi {
            debug!("rejecting trade {}: inverted amount bounds", trade.event_uid);
            return false;
        }
    }
    if trade.ticker.is_empty() && trade.company.is_empty() {
        debug!("rejecting trade {}: no ticker or company", trade.event_uid);
        return false;
    }

    true
}
