//! Daily quote representation and the ingestion checkpoint.

use chrono::NaiveDate;
use serde::Serialize;

/// One trading day of one security. Prices of zero mean no session value was set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub date: NaiveDate,
    pub volume: i64,
    pub trades: i64,
    pub value: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub last_bid_price: Option<f64>,
    pub last_bid_volume: Option<i64>,
    pub last_ask_price: Option<f64>,
    pub last_ask_volume: Option<i64>,
    pub pe_ratio: Option<f64>,
}

impl Quote {
    /// A quote with only the date set; every numeric field is zero.
    pub fn empty(date: NaiveDate) -> Self {
        Quote {
            date,
            volume: 0,
            trades: 0,
            value: 0,
            open: 0.0,
            high: 0.0,
            low: 0.0,
            close: 0.0,
            last_bid_price: None,
            last_bid_volume: None,
            last_ask_price: None,
            last_ask_volume: None,
            pe_ratio: None,
        }
    }

    /// max(open, close)
    pub fn body_high(&self) -> f64 {
        self.open.max(self.close)
    }

    /// min(open, close)
    pub fn body_low(&self) -> f64 {
        self.open.min(self.close)
    }

    pub fn is_down_day(&self) -> bool {
        self.close < self.open
    }

    /// Distance from the lower body edge down to the low.
    pub fn lower_shadow(&self) -> f64 {
        self.body_low() - self.low
    }

    /// Replace OHLC (and P/E) with the previous session's values.
    pub fn carry_forward_from(&mut self, prior: &Quote) {
        self.open = prior.close;
        self.high = prior.close;
        self.low = prior.close;
        self.close = prior.close;
        self.pe_ratio = prior.pe_ratio;
    }
}

/// Boundary of the calendar days that have been fully ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionCheckpoint {
    /// Nothing recorded yet; the next sync performs a full backfill.
    NeedsBackfill,
    Synced { start: NaiveDate, end: NaiveDate },
}

impl IngestionCheckpoint {
    pub fn last_synced(&self) -> Option<NaiveDate> {
        match self {
            IngestionCheckpoint::NeedsBackfill => None,
            IngestionCheckpoint::Synced { end, .. } => Some(*end),
        }
    }
}
