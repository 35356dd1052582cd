//! Technical indicators over quote series.
//!
//! - `IndicatorPoint`: one dated value
//! - `IndicatorType`: indicator identity + window (usable as a map key)
//! - `IndicatorSeries`: values aligned to the tail of the source series
//!
//! A series computed with window `w` over `L` quotes holds `L - w + 1`
//! points; point `j` belongs to source index `j + w - 1`.

pub mod sma;
pub mod wma;

use crate::domain::quote::Quote;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

pub use sma::simple_moving_average;
pub use wma::weighted_volume_average;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum IndicatorType {
    Sma(usize),
    VolumeWma(usize),
}

impl IndicatorType {
    pub fn window(&self) -> usize {
        match self {
            IndicatorType::Sma(w) | IndicatorType::VolumeWma(w) => *w,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(window) => write!(f, "MA{}", window),
            IndicatorType::VolumeWma(window) => write!(f, "VWMA({})", window),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Value belonging to `source_index` of the series this was computed from.
    pub fn at_source_index(&self, source_index: usize) -> Option<f64> {
        let lag = self.indicator_type.window().saturating_sub(1);
        source_index
            .checked_sub(lag)
            .and_then(|i| self.values.get(i))
            .map(|p| p.value)
    }

    /// Points dated on or after `from`.
    pub fn since(&self, from: NaiveDate) -> Vec<IndicatorPoint> {
        self.values
            .iter()
            .filter(|p| p.date >= from)
            .cloned()
            .collect()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().map(|p| p.value)
    }
}

/// Which quote field an indicator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Close,
    Volume,
}

impl Field {
    pub fn of(self, quote: &Quote) -> f64 {
        match self {
            Field::Close => quote.close,
            Field::Volume => quote.volume as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(window: usize, n: usize) -> IndicatorSeries {
        IndicatorSeries {
            indicator_type: IndicatorType::Sma(window),
            values: (0..n)
                .map(|i| IndicatorPoint {
                    date: NaiveDate::from_ymd_opt(2024, 1, (i + window) as u32).unwrap(),
                    value: i as f64,
                })
                .collect(),
        }
    }

    #[test]
    fn indicator_type_display() {
        assert_eq!(IndicatorType::Sma(20).to_string(), "MA20");
        assert_eq!(IndicatorType::VolumeWma(38).to_string(), "VWMA(38)");
    }

    #[test]
    fn at_source_index_applies_warmup_lag() {
        let s = series(5, 3);
        assert_eq!(s.at_source_index(3), None);
        assert_eq!(s.at_source_index(4), Some(0.0));
        assert_eq!(s.at_source_index(6), Some(2.0));
        assert_eq!(s.at_source_index(7), None);
    }

    #[test]
    fn since_filters_by_date() {
        let s = series(1, 5);
        let tail = s.since(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].value, 3.0);
    }

    #[test]
    fn field_reads_close_and_volume() {
        let quote = Quote {
            close: 12.5,
            volume: 3400,
            ..Quote::empty(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        };
        assert_eq!(Field::Close.of(&quote), 12.5);
        assert_eq!(Field::Volume.of(&quote), 3400.0);
    }

    #[test]
    fn indicator_type_hash_eq() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(IndicatorType::Sma(5), "ma5");
        map.insert(IndicatorType::Sma(10), "ma10");
        assert_eq!(map.get(&IndicatorType::Sma(5)), Some(&"ma5"));
        assert_eq!(map.get(&IndicatorType::VolumeWma(5)), None);
    }
}
