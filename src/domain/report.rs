//! Gain and holdings reports derived from a replayed ledger.

use crate::domain::error::GapLedgerError;
use crate::domain::ledger::{Ledger, RealizedGain};
use crate::ports::quote_store_port::QuoteStore;
use crate::ports::reference_port::ReferencePort;
use chrono::{Months, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GainLine {
    pub security: String,
    /// Code followed by display name, e.g. `2330台積電`.
    pub label: String,
    pub net_gain: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingLine {
    pub security: String,
    pub label: String,
    pub quantity: i64,
    pub cost_basis: i64,
    /// `None` when the security has no stored quotes.
    pub market_value: Option<i64>,
    pub unrealized: Option<i64>,
}

/// Start of a trailing window of `months` ending at `today`.
pub fn trailing_start(today: NaiveDate, months: u32) -> NaiveDate {
    today
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

/// Net realized gain per security for gains dated on or after `since`,
/// sorted by security.
pub fn realized_by_security(realized: &[RealizedGain], since: NaiveDate) -> Vec<(String, i64)> {
    let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
    for gain in realized.iter().filter(|g| g.date >= since) {
        *totals.entry(gain.security.as_str()).or_default() += gain.net_gain;
    }
    totals
        .into_iter()
        .map(|(security, total)| (security.to_string(), total))
        .collect()
}

fn label_for(reference: &dyn ReferencePort, security: &str) -> Result<String, GapLedgerError> {
    match reference.name_for(security) {
        Ok(name) => Ok(format!("{security}{name}")),
        Err(GapLedgerError::NotFound { .. }) => Ok(security.to_string()),
        Err(e) => Err(e),
    }
}

pub fn gains_report(
    ledger: &Ledger,
    since: NaiveDate,
    reference: &dyn ReferencePort,
) -> Result<Vec<GainLine>, GapLedgerError> {
    realized_by_security(ledger.realized(), since)
        .into_iter()
        .map(|(security, net_gain)| {
            Ok(GainLine {
                label: label_for(reference, &security)?,
                security,
                net_gain,
            })
        })
        .collect()
}

/// Open positions valued at each security's most recent close.
pub fn holdings_snapshot(
    ledger: &Ledger,
    store: &dyn QuoteStore,
    reference: &dyn ReferencePort,
) -> Result<Vec<HoldingLine>, GapLedgerError> {
    let mut lines = Vec::new();

    for security in ledger.held_securities() {
        let (quantity, cost_basis) = ledger.position(security);
        let close = match store.most_recent(security, 1) {
            Ok(quotes) => quotes.last().map(|q| q.close),
            Err(GapLedgerError::UnknownSecurity { .. }) => None,
            Err(e) => return Err(e),
        };
        let market_value = close.map(|c| (c * quantity as f64).round() as i64);

        lines.push(HoldingLine {
            security: security.to_string(),
            label: label_for(reference, security)?,
            quantity,
            cost_basis,
            market_value,
            unrealized: market_value.map(|v| v - cost_basis),
        });
    }

    Ok(lines)
}
