//! CSV daily-file feed adapter.
//!
//! One file per trading day, `<dir>/YYYY-MM-DD.csv`, with a header row and
//! the columns
//!
//! ```text
//! code,name,volume,trades,value,open,high,low,close[,bid,bid_volume,ask,ask_volume,pe]
//! ```
//!
//! A missing file means the exchange published nothing for that day.

use crate::domain::error::GapLedgerError;
use crate::ports::feed_port::{DailyQuoteFeed, FeedDay, RawQuoteRow};
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

const REQUIRED_COLUMNS: usize = 9;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, date: NaiveDate) -> PathBuf {
        self.base_path.join(format!("{}.csv", date.format("%Y-%m-%d")))
    }
}

fn transport(reason: String) -> GapLedgerError {
    GapLedgerError::Transport { reason }
}

impl DailyQuoteFeed for CsvAdapter {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_day(&self, date: NaiveDate) -> Result<FeedDay, GapLedgerError> {
        let path = self.csv_path(date);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(FeedDay::NoData),
            Err(e) => {
                return Err(transport(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_bytes());
        let mut rows = Vec::new();

        for result in rdr.records() {
            let record =
                result.map_err(|e| transport(format!("CSV parse error in {}: {}", path.display(), e)))?;
            if record.len() < REQUIRED_COLUMNS {
                return Err(transport(format!(
                    "{}: expected at least {} columns, got {}",
                    path.display(),
                    REQUIRED_COLUMNS,
                    record.len()
                )));
            }

            let col = |i: usize| record.get(i).unwrap_or_default().to_string();
            let opt = |i: usize| record.get(i).map(str::to_string);

            rows.push(RawQuoteRow {
                code: col(0),
                name: col(1),
                volume: col(2),
                trades: col(3),
                value: col(4),
                open: col(5),
                high: col(6),
                low: col(7),
                close: col(8),
                last_bid_price: opt(9),
                last_bid_volume: opt(10),
                last_ask_price: opt(11),
                last_ask_volume: opt(12),
                pe_ratio: opt(13),
            });
        }

        if rows.is_empty() {
            return Ok(FeedDay::NoData);
        }
        Ok(FeedDay::Rows(rows))
    }
}
