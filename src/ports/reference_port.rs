//! Code to display-name reference port.

use crate::domain::error::GapLedgerError;

pub trait ReferencePort {
    /// Fails with `NotFound` when the code is not registered.
    fn name_for(&self, code: &str) -> Result<String, GapLedgerError>;

    /// Fails with `NotFound` when the name is not registered.
    fn code_for(&self, name: &str) -> Result<String, GapLedgerError>;

    /// Fails with `DuplicateCode` when `name` is already bound to another code.
    fn register(&self, code: &str, name: &str) -> Result<(), GapLedgerError>;
}
