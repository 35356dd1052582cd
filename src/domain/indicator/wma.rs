//! Linearly weighted moving average over volumes.
//!
//! O(n) sliding window using the Diophantine technique:
//! WMA(n) = (1*V[i-n+1] + 2*V[i-n+2] + ... + n*V[i]) / (n*(n+1)/2)
//! The most recent value in each window carries the largest weight.

use crate::domain::error::GapLedgerError;
use crate::domain::indicator::{Field, IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::quote::Quote;

pub fn weighted_volume_average(
    quotes: &[Quote],
    window: usize,
) -> Result<IndicatorSeries, GapLedgerError> {
    if window == 0 || quotes.len() < window {
        return Err(GapLedgerError::InsufficientHistory {
            bars: quotes.len(),
            window,
        });
    }

    let field = Field::Volume;
    let divisor = (window * (window + 1)) as f64 / 2.0;
    let mut values = Vec::with_capacity(quotes.len() - window + 1);
    let mut weighted_sum: f64 = 0.0;
    let mut window_sum: f64 = 0.0;

    for (i, quote) in quotes.iter().enumerate() {
        let v = field.of(quote);
        if i < window {
            weighted_sum += (i + 1) as f64 * v;
            window_sum += v;
        } else {
            weighted_sum += window as f64 * v - window_sum;
            window_sum += v - field.of(&quotes[i - window]);
        }

        if i + 1 >= window {
            values.push(IndicatorPoint {
                date: quote.date,
                value: weighted_sum / divisor,
            });
        }
    }

    Ok(IndicatorSeries {
        indicator_type: IndicatorType::VolumeWma(window),
        values,
    })
}
