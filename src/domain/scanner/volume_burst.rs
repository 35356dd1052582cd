//! Volume-burst detection.
//!
//! The most recent session is compared against a linearly weighted average
//! of every earlier session in the window. Down-days only count when their
//! lower shadow is long enough to read as a rejected sell-off.

use super::chart::ScanChart;
use super::{Finding, ScanConfig, ScanResult, ScanSkip};
use crate::domain::indicator::{simple_moving_average, weighted_volume_average};
use crate::domain::quote::Quote;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurstFinding {
    pub security: String,
    pub anchor_date: NaiveDate,
    pub volume: i64,
    pub average_volume: f64,
    pub multiple: f64,
}

impl BurstFinding {
    pub fn label(&self) -> String {
        format!(
            "avg={}(x{:.2})",
            humanize(self.average_volume as i64),
            self.multiple
        )
    }
}

/// Scale a count into at most five digits with a K/M/G/T suffix.
///
/// Integer division at each step, so `123_456` becomes `123K`.
pub fn humanize(mut value: i64) -> String {
    let mut index = 0;
    while value >= 100_000 {
        value /= 1000;
        index += 1;
    }
    let unit = match index {
        0 => "",
        1 => "K",
        2 => "M",
        3 => "G",
        4 => "T",
        _ => "?",
    };
    format!("{value}{unit}")
}

pub fn find_volume_burst(
    security: &str,
    window: &[Quote],
    config: &ScanConfig,
) -> Result<ScanResult, ScanSkip> {
    let total = config.window_len();
    if window.len() < total || total < 2 {
        return Err(ScanSkip::TooFewDays {
            have: window.len(),
            need: total.max(2),
        });
    }
    let window = &window[window.len() - total..];
    let last = &window[total - 1];

    if last.volume < config.liquidity_floor {
        return Err(ScanSkip::NotInteresting);
    }
    if last.is_down_day() {
        let body = last.open - last.close;
        if last.lower_shadow() < body * config.shadow_ratio {
            return Err(ScanSkip::NotInteresting);
        }
    }

    let history = &window[..total - 1];
    let average = weighted_volume_average(history, history.len())
        .ok()
        .and_then(|s| s.last())
        .ok_or(ScanSkip::NotInteresting)?;
    if average <= 0.0 {
        return Err(ScanSkip::NotInteresting);
    }
    if (last.volume as f64) <= average * config.burst_multiplier {
        return Err(ScanSkip::NotInteresting);
    }

    let mas = config
        .ma_windows
        .iter()
        .map(|&w| {
            simple_moving_average(window, w).map_err(|_| ScanSkip::TooFewDays {
                have: window.len(),
                need: w,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ScanResult {
        finding: Finding::VolumeBurst(BurstFinding {
            security: security.to_string(),
            anchor_date: last.date,
            volume: last.volume,
            average_volume: average,
            multiple: last.volume as f64 / average,
        }),
        chart: ScanChart::build(window, config.base_days, &mas, None),
    })
}
