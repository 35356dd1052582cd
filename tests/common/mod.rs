#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use gapledger::domain::error::GapLedgerError;
use gapledger::domain::ingestion::IngestConfig;
use gapledger::domain::ledger::{Direction, TaxPolicy, Transaction};
pub use gapledger::domain::quote::Quote;
use gapledger::ports::feed_port::{DailyQuoteFeed, FeedDay, RawQuoteRow};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Feed serving canned days. Dates without an entry are `NoData`.
pub struct MockFeed {
    pub name: String,
    pub days: HashMap<NaiveDate, Vec<RawQuoteRow>>,
    pub failing: Option<NaiveDate>,
    pub calls: Arc<AtomicUsize>,
}

impl MockFeed {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            days: HashMap::new(),
            failing: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_day(mut self, date: NaiveDate, rows: Vec<RawQuoteRow>) -> Self {
        self.days.insert(date, rows);
        self
    }

    pub fn failing_on(mut self, date: NaiveDate) -> Self {
        self.failing = Some(date);
        self
    }

    /// Handle on the call counter that survives boxing the feed.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl DailyQuoteFeed for MockFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_day(&self, date: NaiveDate) -> Result<FeedDay, GapLedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing == Some(date) {
            return Err(GapLedgerError::Transport {
                reason: format!("connection reset on {date}"),
            });
        }
        Ok(match self.days.get(&date) {
            Some(rows) => FeedDay::Rows(rows.clone()),
            None => FeedDay::NoData,
        })
    }
}

/// 2024-06-03 is a Monday.
pub fn june(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

pub fn at(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, 0, 0).unwrap()
}

pub fn fast_ingest() -> IngestConfig {
    IngestConfig {
        min_fetch_interval: Duration::ZERO,
        ..IngestConfig::default()
    }
}

pub fn raw_row(code: &str, name: &str, volume: &str, ohlc: [&str; 4]) -> RawQuoteRow {
    RawQuoteRow {
        code: code.into(),
        name: name.into(),
        volume: volume.into(),
        trades: "10".into(),
        value: "1,000".into(),
        open: ohlc[0].into(),
        high: ohlc[1].into(),
        low: ohlc[2].into(),
        close: ohlc[3].into(),
        ..RawQuoteRow::default()
    }
}

/// A row for a security that did not trade.
pub fn halted_row(code: &str, name: &str) -> RawQuoteRow {
    raw_row(code, name, "0", ["--", "--", "--", "--"])
}

pub fn make_quote(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: i64) -> Quote {
    Quote {
        open,
        high,
        low,
        close,
        volume,
        ..Quote::empty(date)
    }
}

/// `n` consecutive calendar days of flat quotes starting at `start`.
pub fn flat_series(start: NaiveDate, n: usize, price: f64, volume: i64) -> Vec<Quote> {
    start
        .iter_days()
        .take(n)
        .map(|d| make_quote(d, price, price, price, price, volume))
        .collect()
}

pub fn tx(
    security: &str,
    date: NaiveDate,
    direction: Direction,
    price: f64,
    quantity: i64,
    fee: i64,
) -> Transaction {
    Transaction::new(security, date, direction, price, quantity, fee, &TaxPolicy::default()).unwrap()
}
