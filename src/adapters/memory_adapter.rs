//! In-memory store for quotes, names and transactions.
//!
//! Backs tests and dry runs. One lock guards all state, so writers are
//! serialized and every read sees a consistent snapshot of a series.

use crate::domain::error::GapLedgerError;
use crate::domain::ledger::Transaction;
use crate::domain::quote::{IngestionCheckpoint, Quote};
use crate::ports::ledger_port::TransactionLog;
use crate::ports::quote_store_port::QuoteStore;
use crate::ports::reference_port::ReferencePort;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
struct State {
    series: BTreeMap<String, BTreeMap<NaiveDate, Quote>>,
    checkpoint: Option<(NaiveDate, NaiveDate)>,
    names: HashMap<String, String>,
    codes: HashMap<String, String>,
    transactions: Vec<Transaction>,
}

#[derive(Debug, Default)]
pub struct MemoryAdapter {
    state: RwLock<State>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored quotes across all securities.
    pub fn quote_count(&self) -> usize {
        self.state.read().series.values().map(BTreeMap::len).sum()
    }
}

impl QuoteStore for MemoryAdapter {
    fn append(&self, security: &str, quote: &Quote) -> Result<(), GapLedgerError> {
        let mut state = self.state.write();
        let series = state.series.entry(security.to_string()).or_default();
        if series.contains_key(&quote.date) {
            return Err(GapLedgerError::DuplicateDate {
                code: security.to_string(),
                date: quote.date,
            });
        }
        series.insert(quote.date, quote.clone());
        Ok(())
    }

    fn most_recent(&self, security: &str, n: usize) -> Result<Vec<Quote>, GapLedgerError> {
        let state = self.state.read();
        let series = state
            .series
            .get(security)
            .ok_or_else(|| GapLedgerError::UnknownSecurity {
                code: security.to_string(),
            })?;
        let mut quotes: Vec<Quote> = series.values().rev().take(n).cloned().collect();
        quotes.reverse();
        Ok(quotes)
    }

    fn find_prior_to(&self, security: &str, date: NaiveDate) -> Result<Quote, GapLedgerError> {
        let state = self.state.read();
        state
            .series
            .get(security)
            .and_then(|series| series.range(..date).next_back())
            .map(|(_, q)| q.clone())
            .ok_or_else(|| GapLedgerError::NotFound {
                what: format!("quote for {security} before {date}"),
            })
    }

    fn list_securities(&self) -> Result<Vec<String>, GapLedgerError> {
        Ok(self.state.read().series.keys().cloned().collect())
    }

    fn checkpoint(&self) -> Result<IngestionCheckpoint, GapLedgerError> {
        Ok(match self.state.read().checkpoint {
            Some((start, end)) => IngestionCheckpoint::Synced { start, end },
            None => IngestionCheckpoint::NeedsBackfill,
        })
    }

    fn set_checkpoint(&self, start: NaiveDate, end: NaiveDate) -> Result<(), GapLedgerError> {
        self.state.write().checkpoint = Some((start, end));
        Ok(())
    }
}

impl ReferencePort for MemoryAdapter {
    fn name_for(&self, code: &str) -> Result<String, GapLedgerError> {
        self.state
            .read()
            .names
            .get(code)
            .cloned()
            .ok_or_else(|| GapLedgerError::NotFound {
                what: format!("name for {code}"),
            })
    }

    fn code_for(&self, name: &str) -> Result<String, GapLedgerError> {
        self.state
            .read()
            .codes
            .get(name)
            .cloned()
            .ok_or_else(|| GapLedgerError::NotFound {
                what: format!("code for {name}"),
            })
    }

    fn register(&self, code: &str, name: &str) -> Result<(), GapLedgerError> {
        let mut state = self.state.write();
        if let Some(existing) = state.codes.get(name) {
            if existing == code {
                return Ok(());
            }
            return Err(GapLedgerError::DuplicateCode {
                name: name.to_string(),
                existing: existing.clone(),
            });
        }
        if let Some(old_name) = state.names.insert(code.to_string(), name.to_string()) {
            state.codes.remove(&old_name);
        }
        state.codes.insert(name.to_string(), code.to_string());
        Ok(())
    }
}

impl TransactionLog for MemoryAdapter {
    fn append_transaction(&self, transaction: &Transaction) -> Result<(), GapLedgerError> {
        let mut state = self.state.write();
        // stable: equal dates keep insertion order
        let at = state
            .transactions
            .partition_point(|t| t.date <= transaction.date);
        state.transactions.insert(at, transaction.clone());
        Ok(())
    }

    fn transactions(&self) -> Result<Vec<Transaction>, GapLedgerError> {
        Ok(self.state.read().transactions.clone())
    }
}
