//! Price-gap detection and gap invalidation ("closing").
//!
//! For each adjacent pair of sessions in the analysis interval:
//!   upward gap   = current low  - prior high  (Call)
//!   downward gap = prior low    - current high (Put)
//! Only the single largest gap survives a pass. A gap closes on the first
//! later session where the mid moving average has reached the gap day's
//! body edge and the close sits on the losing side of all three averages.

use super::chart::{BoundingLevels, PriceLevel, ScanChart};
use super::{Finding, ScanConfig, ScanResult, ScanSkip, Side};
use crate::domain::indicator::{simple_moving_average, IndicatorSeries};
use crate::domain::quote::Quote;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// Which price extremes bound a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapVariant {
    /// Raw high/low; any strictly larger gap wins.
    Wick,
    /// max/min of open and close; the gap must also clear `gap_margin`.
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GapKind {
    CallGap,
    PutGap,
    CallGapClosed,
    PutGapClosed,
}

impl GapKind {
    pub fn side(self) -> Side {
        match self {
            GapKind::CallGap | GapKind::CallGapClosed => Side::Call,
            GapKind::PutGap | GapKind::PutGapClosed => Side::Put,
        }
    }

    fn closed(self) -> Self {
        match self {
            GapKind::CallGap | GapKind::CallGapClosed => GapKind::CallGapClosed,
            GapKind::PutGap | GapKind::PutGapClosed => GapKind::PutGapClosed,
        }
    }
}

impl fmt::Display for GapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GapKind::CallGap => write!(f, "Call"),
            GapKind::PutGap => write!(f, "Put"),
            GapKind::CallGapClosed => write!(f, "CallClosed"),
            GapKind::PutGapClosed => write!(f, "PutClosed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapFinding {
    pub security: String,
    pub kind: GapKind,
    pub anchor_date: NaiveDate,
    pub magnitude: f64,
    pub levels: BoundingLevels,
}

struct Candidate {
    kind: GapKind,
    day: usize,
    magnitude: f64,
    levels: BoundingLevels,
}

fn extremes(q: &Quote, variant: GapVariant) -> (f64, f64) {
    match variant {
        GapVariant::Wick => (q.high, q.low),
        GapVariant::Body => (q.body_high(), q.body_low()),
    }
}

fn largest_gap(window: &[Quote], variant: GapVariant, config: &ScanConfig) -> Option<Candidate> {
    let mut found: Option<Candidate> = None;

    for day in config.base_days.max(1)..window.len() {
        let prior = &window[day - 1];
        let current = &window[day];
        let (h1, l1) = extremes(prior, variant);
        let (h2, l2) = extremes(current, variant);

        let up = l2 - h1;
        let down = l1 - h2;
        let best = found.as_ref().map_or(0.0, |c| c.magnitude);

        let clears = |near: f64, far: f64| match variant {
            GapVariant::Wick => true,
            GapVariant::Body => near * config.gap_margin < far,
        };

        if up > 0.0 && up > best && clears(h1, l2) {
            found = Some(Candidate {
                kind: GapKind::CallGap,
                day,
                magnitude: up,
                levels: BoundingLevels {
                    upper: PriceLevel {
                        price: l2,
                        from: current.date,
                    },
                    lower: PriceLevel {
                        price: h1,
                        from: prior.date,
                    },
                },
            });
        } else if down > 0.0 && down > best && clears(h2, l1) {
            found = Some(Candidate {
                kind: GapKind::PutGap,
                day,
                magnitude: down,
                levels: BoundingLevels {
                    upper: PriceLevel {
                        price: l1,
                        from: prior.date,
                    },
                    lower: PriceLevel {
                        price: h2,
                        from: current.date,
                    },
                },
            });
        }
    }

    found
}

/// First session after `gap_day` that invalidates the gap.
fn find_closure(
    window: &[Quote],
    gap_day: usize,
    side: Side,
    mas: &[IndicatorSeries; 3],
) -> Option<usize> {
    let anchor = &window[gap_day];

    for i in (gap_day + 1)..window.len() {
        let (Some(fast), Some(mid), Some(slow)) = (
            mas[0].at_source_index(i),
            mas[1].at_source_index(i),
            mas[2].at_source_index(i),
        ) else {
            continue;
        };
        let close = window[i].close;

        let failed = match side {
            Side::Call => {
                mid <= anchor.body_low() && close <= fast && close <= mid && close <= slow
            }
            Side::Put => {
                mid >= anchor.body_high() && close >= fast && close >= mid && close >= slow
            }
        };
        if failed {
            return Some(i);
        }
    }
    None
}

pub fn find_gap(
    security: &str,
    window: &[Quote],
    variant: GapVariant,
    side: Option<Side>,
    config: &ScanConfig,
) -> Result<ScanResult, ScanSkip> {
    let total = config.window_len();
    if window.len() != total {
        return Err(ScanSkip::TooFewDays {
            have: window.len(),
            need: total,
        });
    }
    let last = window.last().ok_or(ScanSkip::NotInteresting)?;
    if last.volume < config.liquidity_floor {
        return Err(ScanSkip::NotInteresting);
    }

    let candidate = largest_gap(window, variant, config).ok_or(ScanSkip::NotInteresting)?;

    let [w1, w2, w3] = config.ma_windows;
    let ma = |w: usize| {
        simple_moving_average(window, w).map_err(|_| ScanSkip::TooFewDays {
            have: window.len(),
            need: w,
        })
    };
    let mas = [ma(w1)?, ma(w2)?, ma(w3)?];

    let kind = match find_closure(window, candidate.day, candidate.kind.side(), &mas) {
        Some(day) if total - day <= config.closure_window => candidate.kind.closed(),
        Some(_) => return Err(ScanSkip::NotInteresting),
        None if candidate.day + config.open_recency >= total => candidate.kind,
        None => return Err(ScanSkip::NotInteresting),
    };

    if side.is_some_and(|s| s != kind.side()) {
        return Err(ScanSkip::NotInteresting);
    }

    let chart = ScanChart::build(window, config.base_days, &mas, Some(candidate.levels));
    Ok(ScanResult {
        finding: Finding::Gap(GapFinding {
            security: security.to_string(),
            kind,
            anchor_date: window[candidate.day].date,
            magnitude: candidate.magnitude,
            levels: candidate.levels,
        }),
        chart,
    })
}
