//! HTTP daily-quote feeds for the listed (TWSE) and OTC (TPEx) boards.
//!
//! Both endpoints return one JSON document per day holding several tables;
//! only the daily closing-quote table is read. The two boards lay out their
//! columns differently and signal "no data" differently: TWSE omits the
//! tables entirely, TPEx reports a zero total count.

use crate::domain::error::GapLedgerError;
use crate::ports::feed_port::{DailyQuoteFeed, FeedDay, RawQuoteRow};
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

const TWSE_URL: &str = "https://www.twse.com.tw/exchangeReport/MI_INDEX";
const TPEX_URL: &str = "https://www.tpex.org.tw/www/zh-tw/afterTrading/otc";

const TWSE_TABLE_TITLE: &str = "每日收盤行情";
const TPEX_TABLE_TITLE: &str = "上櫃股票每日收盤行情";

#[derive(Debug, Deserialize)]
struct TwseReport {
    tables: Option<Vec<Table>>,
}

#[derive(Debug, Deserialize)]
struct TpexReport {
    #[serde(default)]
    tables: Vec<Table>,
}

#[derive(Debug, Deserialize)]
struct Table {
    #[serde(default)]
    title: String,
    #[serde(default, rename = "totalCount")]
    total_count: Option<i64>,
    #[serde(default)]
    data: Vec<Vec<String>>,
}

fn transport(reason: impl Into<String>) -> GapLedgerError {
    GapLedgerError::Transport {
        reason: reason.into(),
    }
}

fn cell(row: &[String], idx: usize, date: NaiveDate) -> Result<String, GapLedgerError> {
    row.get(idx).cloned().ok_or_else(|| GapLedgerError::MalformedRow {
        code: row.first().cloned().unwrap_or_default(),
        date,
        reason: format!("row has {} columns, expected more than {idx}", row.len()),
    })
}

fn optional_cell(row: &[String], idx: usize) -> Option<String> {
    row.get(idx).cloned()
}

/// code, name, volume, trades, value, open, high, low, close, direction,
/// change, bid, bid volume, ask, ask volume, P/E
fn twse_row(row: &[String], date: NaiveDate) -> Result<RawQuoteRow, GapLedgerError> {
    Ok(RawQuoteRow {
        code: cell(row, 0, date)?,
        name: cell(row, 1, date)?,
        volume: cell(row, 2, date)?,
        trades: cell(row, 3, date)?,
        value: cell(row, 4, date)?,
        open: cell(row, 5, date)?,
        high: cell(row, 6, date)?,
        low: cell(row, 7, date)?,
        close: cell(row, 8, date)?,
        last_bid_price: optional_cell(row, 11),
        last_bid_volume: optional_cell(row, 12),
        last_ask_price: optional_cell(row, 13),
        last_ask_volume: optional_cell(row, 14),
        pe_ratio: optional_cell(row, 15),
    })
}

/// code, name, close, change, open, high, low, volume, value, trades,
/// bid, bid volume, ask, ask volume
fn tpex_row(row: &[String], date: NaiveDate) -> Result<RawQuoteRow, GapLedgerError> {
    Ok(RawQuoteRow {
        code: cell(row, 0, date)?,
        name: cell(row, 1, date)?,
        close: cell(row, 2, date)?,
        open: cell(row, 4, date)?,
        high: cell(row, 5, date)?,
        low: cell(row, 6, date)?,
        volume: cell(row, 7, date)?,
        value: cell(row, 8, date)?,
        trades: cell(row, 9, date)?,
        last_bid_price: optional_cell(row, 10),
        last_bid_volume: optional_cell(row, 11),
        last_ask_price: optional_cell(row, 12),
        last_ask_volume: optional_cell(row, 13),
        pe_ratio: None,
    })
}

fn collect_rows(
    tables: &[Table],
    title: &str,
    date: NaiveDate,
    parse: fn(&[String], NaiveDate) -> Result<RawQuoteRow, GapLedgerError>,
) -> Result<FeedDay, GapLedgerError> {
    let rows = tables
        .iter()
        .filter(|t| t.title.contains(title))
        .flat_map(|t| t.data.iter())
        .map(|r| parse(r, date))
        .collect::<Result<Vec<_>, _>>()?;
    if rows.is_empty() {
        return Ok(FeedDay::NoData);
    }
    Ok(FeedDay::Rows(rows))
}

pub fn parse_twse(body: &str, date: NaiveDate) -> Result<FeedDay, GapLedgerError> {
    let report: TwseReport =
        serde_json::from_str(body).map_err(|e| transport(format!("TWSE response: {e}")))?;
    match report.tables {
        None => Ok(FeedDay::NoData),
        Some(tables) => collect_rows(&tables, TWSE_TABLE_TITLE, date, twse_row),
    }
}

pub fn parse_tpex(body: &str, date: NaiveDate) -> Result<FeedDay, GapLedgerError> {
    let report: TpexReport =
        serde_json::from_str(body).map_err(|e| transport(format!("TPEx response: {e}")))?;
    match report.tables.first() {
        None => Ok(FeedDay::NoData),
        Some(first) if first.total_count == Some(0) => Ok(FeedDay::NoData),
        Some(_) => collect_rows(&report.tables, TPEX_TABLE_TITLE, date, tpex_row),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Board {
    Twse,
    Tpex,
}

impl Board {
    pub fn parse_name(name: &str) -> Option<Board> {
        match name.trim().to_ascii_lowercase().as_str() {
            "twse" => Some(Board::Twse),
            "tpex" => Some(Board::Tpex),
            _ => None,
        }
    }

    fn url(self, date: NaiveDate) -> String {
        match self {
            Board::Twse => format!(
                "{TWSE_URL}?response=json&date={}&type=ALLBUT0999",
                date.format("%Y%m%d")
            ),
            Board::Tpex => format!(
                "{TPEX_URL}?date={}&type=EW&response=json",
                date.format("%Y/%m/%d")
            ),
        }
    }
}

pub struct ExchangeFeed {
    board: Board,
    client: reqwest::blocking::Client,
}

impl ExchangeFeed {
    pub fn new(board: Board) -> Result<Self, GapLedgerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) gapledger")
            .build()
            .map_err(|e| transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { board, client })
    }
}

impl DailyQuoteFeed for ExchangeFeed {
    fn name(&self) -> &str {
        match self.board {
            Board::Twse => "twse",
            Board::Tpex => "tpex",
        }
    }

    fn fetch_day(&self, date: NaiveDate) -> Result<FeedDay, GapLedgerError> {
        let url = self.board.url(date);
        tracing::debug!(%url, "fetching");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| transport(format!("{}: {e}", self.name())))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(transport(format!("{} returned HTTP {status}", self.name())));
        }
        let body = resp
            .text()
            .map_err(|e| transport(format!("{}: {e}", self.name())))?;

        match self.board {
            Board::Twse => parse_twse(&body, date),
            Board::Tpex => parse_tpex(&body, date),
        }
    }
}
