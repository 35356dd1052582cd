//! Visualization series emitted alongside each finding.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::quote::Quote;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl From<&Quote> for Candle {
    fn from(q: &Quote) -> Self {
        Candle {
            date: q.date,
            open: q.open,
            high: q.high,
            low: q.low,
            close: q.close,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeBar {
    pub date: NaiveDate,
    pub volume: i64,
}

/// A horizontal price line drawn from `from` to the window end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceLevel {
    pub price: f64,
    pub from: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingLevels {
    pub upper: PriceLevel,
    pub lower: PriceLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovingAverageLine {
    pub indicator: IndicatorType,
    pub label: String,
    pub points: Vec<IndicatorPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanChart {
    pub candles: Vec<Candle>,
    pub volumes: Vec<VolumeBar>,
    pub moving_averages: Vec<MovingAverageLine>,
    pub levels: Option<BoundingLevels>,
    pub end_date: Option<NaiveDate>,
}

impl ScanChart {
    /// Chart of `window[from..]` with the moving averages clipped to the same span.
    pub fn build(
        window: &[Quote],
        from: usize,
        moving_averages: &[IndicatorSeries],
        levels: Option<BoundingLevels>,
    ) -> Self {
        let shown = window.get(from..).unwrap_or(&[]);
        let start_date = shown.first().map(|q| q.date);

        let moving_averages = moving_averages
            .iter()
            .map(|series| MovingAverageLine {
                indicator: series.indicator_type.clone(),
                label: series.indicator_type.to_string().to_lowercase(),
                points: match start_date {
                    Some(d) => series.since(d),
                    None => vec![],
                },
            })
            .collect();

        ScanChart {
            candles: shown.iter().map(Candle::from).collect(),
            volumes: shown
                .iter()
                .map(|q| VolumeBar {
                    date: q.date,
                    volume: q.volume,
                })
                .collect(),
            moving_averages,
            levels,
            end_date: shown.last().map(|q| q.date),
        }
    }
}
