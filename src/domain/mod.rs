//! Core domain types and logic.

pub mod config_validation;
pub mod error;
pub mod indicator;
pub mod ingestion;
pub mod ledger;
pub mod normalize;
pub mod quote;
pub mod report;
pub mod scanner;
pub mod transaction_entry;
