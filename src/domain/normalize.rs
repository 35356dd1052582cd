//! Raw feed row normalization and instrument exclusion.
//!
//! Feed values are comma-grouped decimal strings. A close field containing
//! the no-session marker `--` means the security did not trade; the quote is
//! then emitted with zero volume and zero prices so that ingestion can carry
//! the previous close forward.

use crate::domain::quote::Quote;
use crate::ports::feed_port::RawQuoteRow;
use chrono::NaiveDate;
use regex::Regex;

pub const NO_SESSION_MARKER: &str = "--";

/// ETN and warrant code patterns for the listed and OTC boards.
pub const DEFAULT_EXCLUSION_PATTERNS: &[&str] = &[
    "02[0-9][0-9][0-9][0-9]",
    "02[0-9][0-9][0-9][LRB]",
    "0[3-8][0-9][0-9][0-9][0-9]",
    "0[3-8][0-9][0-9][0-9][PFQCBXY]",
    "7[0-3][0-9][0-9][0-9][0-9]",
    "7[0-3][0-9][0-9][0-9][PFQCBXY]",
];

/// Why a row could not be normalized. Carries the offending field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid {field} value: {value:?}")]
pub struct FieldError {
    pub field: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid exclusion pattern {pattern:?}: {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

/// A regular expression matched against the whole code. Rules may carry
/// their own `^`/`$` anchors; the match is anchored either way.
#[derive(Debug, Clone)]
pub struct CodePattern {
    regex: Regex,
}

impl CodePattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let err = |reason: String| PatternError {
            pattern: pattern.to_string(),
            reason,
        };
        if pattern.trim().is_empty() {
            return Err(err("empty pattern".into()));
        }
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| err(e.to_string()))?;
        Ok(CodePattern { regex })
    }

    pub fn matches(&self, code: &str) -> bool {
        self.regex.is_match(code)
    }
}

impl PartialEq for CodePattern {
    fn eq(&self, other: &Self) -> bool {
        self.regex.as_str() == other.regex.as_str()
    }
}

/// The set of instrument codes ingestion skips (warrants, ETNs).
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusionRules {
    patterns: Vec<CodePattern>,
}

impl ExclusionRules {
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        let patterns = patterns
            .iter()
            .map(|p| CodePattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ExclusionRules { patterns })
    }

    pub fn is_excluded(&self, code: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(code))
    }
}

impl Default for ExclusionRules {
    fn default() -> Self {
        let patterns = DEFAULT_EXCLUSION_PATTERNS
            .iter()
            .filter_map(|p| CodePattern::parse(p).ok())
            .collect();
        ExclusionRules { patterns }
    }
}

fn strip_grouping(raw: &str) -> String {
    raw.trim().replace(',', "")
}

pub fn parse_int(field: &'static str, raw: &str) -> Result<i64, FieldError> {
    strip_grouping(raw).parse().map_err(|_| FieldError {
        field,
        value: raw.to_string(),
    })
}

pub fn parse_price(field: &'static str, raw: &str) -> Result<f64, FieldError> {
    strip_grouping(raw).parse().map_err(|_| FieldError {
        field,
        value: raw.to_string(),
    })
}

/// Optional order-book / P/E columns: blank or placeholder values become `None`.
fn parse_optional<T>(
    raw: Option<&str>,
    parse: impl Fn(&str) -> Result<T, FieldError>,
) -> Result<Option<T>, FieldError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.contains(NO_SESSION_MARKER) => Ok(None),
        Some(v) => parse(v).map(Some),
    }
}

/// Turn a raw feed row into a quote for `date`, failing on the first
/// unparseable field.
pub fn normalize_row(row: &RawQuoteRow, date: NaiveDate) -> Result<Quote, FieldError> {
    if row.close.contains(NO_SESSION_MARKER) {
        return Ok(Quote::empty(date));
    }

    let volume = parse_int("volume", &row.volume)?;
    let trades = parse_int("trades", &row.trades)?;
    let value = parse_int("value", &row.value)?;
    let open = parse_price("open", &row.open)?;
    let high = parse_price("high", &row.high)?;
    let low = parse_price("low", &row.low)?;
    let close = parse_price("close", &row.close)?;

    let last_bid_price =
        parse_optional(row.last_bid_price.as_deref(), |v| parse_price("last_bid_price", v))?;
    let last_bid_volume =
        parse_optional(row.last_bid_volume.as_deref(), |v| parse_int("last_bid_volume", v))?;
    let last_ask_price =
        parse_optional(row.last_ask_price.as_deref(), |v| parse_price("last_ask_price", v))?;
    let last_ask_volume =
        parse_optional(row.last_ask_volume.as_deref(), |v| parse_int("last_ask_volume", v))?;
    let pe_ratio = parse_optional(row.pe_ratio.as_deref(), |v| parse_price("pe_ratio", v))?;

    if volume < 0 {
        return Err(FieldError {
            field: "volume",
            value: row.volume.clone(),
        });
    }

    let mut quote = Quote {
        date,
        volume,
        trades,
        value,
        open,
        high,
        low,
        close,
        last_bid_price,
        last_bid_volume,
        last_ask_price,
        last_ask_volume,
        pe_ratio,
    };

    if quote.volume == 0 {
        quote.open = 0.0;
        quote.high = 0.0;
        quote.low = 0.0;
        quote.close = 0.0;
    }

    Ok(quote)
}
