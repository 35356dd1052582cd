//! Keyed time-series store port for daily quotes.

use crate::domain::error::GapLedgerError;
use crate::domain::quote::{IngestionCheckpoint, Quote};
use chrono::NaiveDate;

/// Append-only, per-security store of daily quotes.
///
/// Implementations must keep each series strictly ordered by date and must
/// present a consistent snapshot of a series to readers.
pub trait QuoteStore {
    /// Fails with `DuplicateDate` when the (security, date) pair already exists.
    fn append(&self, security: &str, quote: &Quote) -> Result<(), GapLedgerError>;

    /// Up to `n` most recent quotes, oldest first. Fails with `UnknownSecurity`.
    fn most_recent(&self, security: &str, n: usize) -> Result<Vec<Quote>, GapLedgerError>;

    /// Latest quote strictly before `date`. Fails with `NotFound`.
    fn find_prior_to(&self, security: &str, date: NaiveDate) -> Result<Quote, GapLedgerError>;

    /// Known security codes, sorted.
    fn list_securities(&self) -> Result<Vec<String>, GapLedgerError>;

    fn checkpoint(&self) -> Result<IngestionCheckpoint, GapLedgerError>;

    fn set_checkpoint(&self, start: NaiveDate, end: NaiveDate) -> Result<(), GapLedgerError>;
}
