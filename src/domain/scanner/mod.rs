//! Pattern scanning over fixed-length quote windows.
//!
//! A scan window is `base_days` of baseline (enough to seed the longest
//! moving average) followed by `interval` days of analysis. Each scanner is a
//! pure function of its window: identical input yields identical output.
//!
//! Scanners report "no finding" through [`ScanSkip`], which callers treat as
//! a reason to move on to the next security, never as a batch failure.

pub mod chart;
pub mod gap;
pub mod volume_burst;

use crate::domain::error::GapLedgerError;
use crate::ports::quote_store_port::QuoteStore;
use serde::Serialize;
use std::fmt;

pub use chart::ScanChart;
pub use gap::{find_gap, GapFinding, GapKind, GapVariant};
pub use volume_burst::{find_volume_burst, BurstFinding};

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub base_days: usize,
    pub interval: usize,
    /// Minimum most-recent-day volume.
    pub liquidity_floor: i64,
    /// Body variant: the far side of a gap must clear the near side × this.
    pub gap_margin: f64,
    /// A closure this many days (or fewer) before the window end reclassifies the gap.
    pub closure_window: usize,
    /// An unclosed gap this many days (or fewer) before the window end is kept.
    pub open_recency: usize,
    pub burst_multiplier: f64,
    /// Down-days need a lower shadow of at least body × this to count as a burst.
    pub shadow_ratio: f64,
    pub max_findings: usize,
    pub ma_windows: [usize; 3],
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            base_days: 19,
            interval: 20,
            liquidity_floor: 300,
            gap_margin: 1.02,
            closure_window: 3,
            open_recency: 4,
            burst_multiplier: 3.0,
            shadow_ratio: 2.0,
            max_findings: 32,
            ma_windows: [5, 10, 20],
        }
    }
}

impl ScanConfig {
    pub fn window_len(&self) -> usize {
        self.base_days + self.interval
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanSkip {
    #[error("too few days: have {have}, need {need}")]
    TooFewDays { have: usize, need: usize },

    #[error("not interesting")]
    NotInteresting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    Call,
    Put,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Call => write!(f, "call"),
            Side::Put => write!(f, "put"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOp {
    Gap(GapVariant),
    VolumeBurst,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Finding {
    Gap(GapFinding),
    VolumeBurst(BurstFinding),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub finding: Finding,
    pub chart: ScanChart,
}

impl ScanResult {
    pub fn security(&self) -> &str {
        match &self.finding {
            Finding::Gap(g) => &g.security,
            Finding::VolumeBurst(b) => &b.security,
        }
    }

    /// Short human label, e.g. `Call` or `avg=12K(x4.10)`.
    pub fn info(&self) -> String {
        match &self.finding {
            Finding::Gap(g) => g.kind.to_string(),
            Finding::VolumeBurst(b) => b.label(),
        }
    }
}

/// Run one scanner over one window.
pub fn scan_window(
    security: &str,
    window: &[crate::domain::quote::Quote],
    op: ScanOp,
    side: Option<Side>,
    config: &ScanConfig,
) -> Result<ScanResult, ScanSkip> {
    match op {
        ScanOp::Gap(variant) => find_gap(security, window, variant, side, config),
        ScanOp::VolumeBurst => find_volume_burst(security, window, config),
    }
}

/// One bounded page of a universe scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanPage {
    pub results: Vec<ScanResult>,
    pub call_count: usize,
    pub put_count: usize,
    /// Index into the security list to resume from; `None` once exhausted.
    pub next: Option<usize>,
}

/// Scan securities starting at index `start` until the list is exhausted or
/// `max_findings` results have been collected.
pub fn scan_universe(
    store: &dyn QuoteStore,
    op: ScanOp,
    side: Option<Side>,
    start: usize,
    config: &ScanConfig,
) -> Result<ScanPage, GapLedgerError> {
    let securities = store.list_securities()?;
    let need = config.window_len();
    let mut page = ScanPage {
        results: Vec::new(),
        call_count: 0,
        put_count: 0,
        next: None,
    };

    tracing::info!(
        start,
        universe = securities.len(),
        ?op,
        "scanning securities"
    );

    for (i, security) in securities.iter().enumerate().skip(start) {
        let window = store.most_recent(security, need)?;

        let result = match scan_window(security, &window, op, side, config) {
            Ok(r) => r,
            Err(skip) => {
                tracing::debug!(%security, %skip, "skipped");
                continue;
            }
        };

        if let Finding::Gap(g) = &result.finding {
            match g.kind.side() {
                Side::Call => page.call_count += 1,
                Side::Put => page.put_count += 1,
            }
        }
        tracing::info!(%security, info = %result.info(), "found candidate");
        page.results.push(result);

        if page.results.len() >= config.max_findings {
            if i + 1 < securities.len() {
                page.next = Some(i + 1);
            }
            break;
        }
    }

    Ok(page)
}
