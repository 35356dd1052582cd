//! Transaction log port.

use crate::domain::error::GapLedgerError;
use crate::domain::ledger::Transaction;

pub trait TransactionLog {
    fn append_transaction(&self, transaction: &Transaction) -> Result<(), GapLedgerError>;

    /// Every recorded transaction, oldest first; same-day entries keep insertion order.
    fn transactions(&self) -> Result<Vec<Transaction>, GapLedgerError>;
}
