//! Daily quote feed port.

use crate::domain::error::GapLedgerError;
use chrono::NaiveDate;

/// One instrument row as delivered by a feed, before normalization.
///
/// Numeric fields are comma-grouped decimal strings; optional order-book and
/// P/E columns are `None` when the feed layout has no such column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQuoteRow {
    pub code: String,
    pub name: String,
    pub volume: String,
    pub trades: String,
    pub value: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub last_bid_price: Option<String>,
    pub last_bid_volume: Option<String>,
    pub last_ask_price: Option<String>,
    pub last_ask_volume: Option<String>,
    pub pe_ratio: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedDay {
    /// The exchange published nothing for this date (holiday, typhoon day).
    NoData,
    Rows(Vec<RawQuoteRow>),
}

pub trait DailyQuoteFeed {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Fetch one calendar day. Transport failures and non-success statuses
    /// are `Transport` errors; an empty day is `FeedDay::NoData`.
    fn fetch_day(&self, date: NaiveDate) -> Result<FeedDay, GapLedgerError>;
}
