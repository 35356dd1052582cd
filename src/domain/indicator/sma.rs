//! Simple Moving Average over closes.
//!
//! O(n) running-sum implementation: each step adds the incoming close and
//! subtracts the close leaving the window. No warmup points are emitted.

use crate::domain::error::GapLedgerError;
use crate::domain::indicator::{Field, IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::quote::Quote;

pub fn simple_moving_average(
    quotes: &[Quote],
    window: usize,
) -> Result<IndicatorSeries, GapLedgerError> {
    if window == 0 || quotes.len() < window {
        return Err(GapLedgerError::InsufficientHistory {
            bars: quotes.len(),
            window,
        });
    }

    let field = Field::Close;
    let mut values = Vec::with_capacity(quotes.len() - window + 1);
    let mut sum: f64 = quotes[..window - 1].iter().map(|q| field.of(q)).sum();

    for i in (window - 1)..quotes.len() {
        sum += field.of(&quotes[i]);
        values.push(IndicatorPoint {
            date: quotes[i].date,
            value: sum / window as f64,
        });
        sum -= field.of(&quotes[i + 1 - window]);
    }

    Ok(IndicatorSeries {
        indicator_type: IndicatorType::Sma(window),
        values,
    })
}
