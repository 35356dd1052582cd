//! Domain error types.

use chrono::NaiveDate;

/// A transaction entry line that could not be turned into a transaction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntryError {
    #[error("expected at least 7 tab-separated fields, got {0}")]
    TooFewFields(usize),

    #[error("invalid date format: {0}")]
    InvalidDate(String),

    #[error("unrecognized direction: {0}")]
    InvalidDirection(String),

    #[error("no security code registered for name {0}")]
    UnknownName(String),

    #[error("invalid {field} value: {value}")]
    InvalidNumber { field: &'static str, value: String },
}

/// Top-level error type for gapledger.
#[derive(Debug, thiserror::Error)]
pub enum GapLedgerError {
    #[error("feed transport error: {reason}")]
    Transport { reason: String },

    #[error("malformed row for {code} on {date}: {reason}")]
    MalformedRow {
        code: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("quote for {code} on {date} already exists")]
    DuplicateDate { code: String, date: NaiveDate },

    #[error("name {name} is already bound to code {existing}")]
    DuplicateCode { name: String, existing: String },

    #[error("unknown security {code}")]
    UnknownSecurity { code: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("insufficient history: have {bars} quotes, need {window}")]
    InsufficientHistory { bars: usize, window: usize },

    #[error(transparent)]
    Entry(#[from] EntryError),

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&GapLedgerError> for std::process::ExitCode {
    fn from(err: &GapLedgerError) -> Self {
        let code: u8 = match err {
            GapLedgerError::Io(_) => 1,
            GapLedgerError::ConfigParse { .. }
            | GapLedgerError::ConfigMissing { .. }
            | GapLedgerError::ConfigInvalid { .. } => 2,
            GapLedgerError::Database { .. } | GapLedgerError::DatabaseQuery { .. } => 3,
            GapLedgerError::Transport { .. } | GapLedgerError::MalformedRow { .. } => 4,
            GapLedgerError::Entry(_)
            | GapLedgerError::DuplicateDate { .. }
            | GapLedgerError::DuplicateCode { .. } => 5,
            GapLedgerError::UnknownSecurity { .. }
            | GapLedgerError::NotFound { .. }
            | GapLedgerError::InsufficientHistory { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
