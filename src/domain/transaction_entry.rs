//! Broker statement import.
//!
//! One transaction per tab-separated line:
//!
//! ```text
//! date  direction  name  price  quantity  <unused>  fee
//! ```
//!
//! `date` is `MMDD` (year supplied by the caller) or `YYYYMMDD`. Numbers may
//! carry thousands separators. The display name is resolved to a security
//! code through the reference table.

use crate::domain::error::{EntryError, GapLedgerError};
use crate::domain::ledger::{Direction, TaxPolicy, Transaction};
use crate::domain::normalize::{parse_int, parse_price, FieldError};
use crate::ports::ledger_port::TransactionLog;
use crate::ports::reference_port::ReferencePort;
use chrono::NaiveDate;

const FIELD_COUNT: usize = 7;

impl From<FieldError> for EntryError {
    fn from(e: FieldError) -> Self {
        EntryError::InvalidNumber {
            field: e.field,
            value: e.value,
        }
    }
}

pub fn parse_date(raw: &str, year: i32) -> Result<NaiveDate, EntryError> {
    let raw = raw.trim();
    let full = match raw.len() {
        4 => format!("{year:04}{raw}"),
        8 => raw.to_string(),
        _ => return Err(EntryError::InvalidDate(raw.to_string())),
    };
    if !full.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EntryError::InvalidDate(raw.to_string()));
    }
    NaiveDate::parse_from_str(&full, "%Y%m%d")
        .map_err(|_| EntryError::InvalidDate(raw.to_string()))
}

/// `買` anywhere or a leading `B` means buy; `賣` or a leading `S` means sell.
pub fn parse_direction(raw: &str) -> Result<Direction, EntryError> {
    let raw = raw.trim();
    if raw.contains('買') || raw.starts_with(['B', 'b']) {
        Ok(Direction::Buy)
    } else if raw.contains('賣') || raw.starts_with(['S', 's']) {
        Ok(Direction::Sell)
    } else {
        Err(EntryError::InvalidDirection(raw.to_string()))
    }
}

/// Parse a single entry line into a transaction.
pub fn parse_entry(
    line: &str,
    year: i32,
    reference: &dyn ReferencePort,
    policy: &TaxPolicy,
) -> Result<Transaction, GapLedgerError> {
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() < FIELD_COUNT {
        return Err(EntryError::TooFewFields(parts.len()).into());
    }

    let date = parse_date(parts[0], year)?;
    let direction = parse_direction(parts[1])?;
    let name = parts[2].trim();
    let code = match reference.code_for(name) {
        Ok(code) => code,
        Err(GapLedgerError::NotFound { .. }) => {
            return Err(EntryError::UnknownName(name.to_string()).into());
        }
        Err(e) => return Err(e),
    };
    let price = parse_price("price", parts[3]).map_err(EntryError::from)?;
    let quantity = parse_int("quantity", parts[4]).map_err(EntryError::from)?;
    let fee = parse_int("fee", parts[6]).map_err(EntryError::from)?;

    Ok(Transaction::new(
        &code, date, direction, price, quantity, fee, policy,
    )?)
}

/// Where an import stopped.
#[derive(Debug)]
pub struct ImportStop {
    /// 1-based line number within the submitted text.
    pub line: usize,
    pub error: GapLedgerError,
    /// The failing line and everything after it, unprocessed.
    pub remaining: String,
}

#[derive(Debug)]
pub struct ImportReport {
    pub imported: Vec<Transaction>,
    pub stopped: Option<ImportStop>,
}

/// Parse and record each line in order. The first failure stops the import;
/// lines before it stay recorded.
pub fn import_entries(
    text: &str,
    year: i32,
    reference: &dyn ReferencePort,
    log: &dyn TransactionLog,
    policy: &TaxPolicy,
) -> ImportReport {
    let mut report = ImportReport {
        imported: Vec::new(),
        stopped: None,
    };
    let lines: Vec<&str> = text.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let outcome = parse_entry(line.trim_end_matches('\r'), year, reference, policy)
            .and_then(|tx| log.append_transaction(&tx).map(|_| tx));

        match outcome {
            Ok(tx) => {
                tracing::debug!(security = %tx.security, date = %tx.date, "imported transaction");
                report.imported.push(tx);
            }
            Err(error) => {
                tracing::warn!(line = i + 1, %error, "import stopped");
                report.stopped = Some(ImportStop {
                    line: i + 1,
                    error,
                    remaining: lines[i..].join("\n"),
                });
                break;
            }
        }
    }

    report
}
