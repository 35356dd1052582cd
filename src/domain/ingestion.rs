//! Daily quote ingestion.
//!
//! A sync walks weekdays from the day after the checkpoint through the most
//! recent closed session, pulling each day from every configured feed in
//! order. Days are processed strictly sequentially because a zero-volume
//! day copies its prices from the previous stored session.
//!
//! The checkpoint only moves after the whole walk succeeds. Transport
//! failures and malformed rows abort the sync; re-running it is safe since
//! already-stored days are skipped as duplicates.

use crate::domain::error::GapLedgerError;
use crate::domain::normalize::{normalize_row, ExclusionRules};
use crate::domain::quote::IngestionCheckpoint;
use crate::ports::feed_port::{DailyQuoteFeed, FeedDay, RawQuoteRow};
use crate::ports::quote_store_port::QuoteStore;
use crate::ports::reference_port::ReferencePort;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// Local hour from which the current day counts as a closed session.
    pub cutoff_hour: u32,
    /// Days fetched on the first sync.
    pub backfill_days: i64,
    pub min_fetch_interval: Duration,
    pub exclusions: ExclusionRules,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            cutoff_hour: 15,
            backfill_days: 70,
            min_fetch_interval: Duration::from_secs(3),
            exclusions: ExclusionRules::default(),
        }
    }
}

/// Minimum spacing between consecutive calls to one feed. Blocks, never drops.
#[derive(Debug)]
pub struct FetchThrottle {
    min_interval: Duration,
    last_fetch: Option<Instant>,
}

impl FetchThrottle {
    pub fn new(min_interval: Duration) -> Self {
        FetchThrottle {
            min_interval,
            last_fetch: None,
        }
    }

    /// Sleep until `min_interval` has passed since the previous call.
    pub fn wait(&mut self) {
        if let Some(last) = self.last_fetch {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last_fetch = Some(Instant::now());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub days_walked: usize,
    pub days_without_data: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub carried_forward: usize,
    pub excluded: usize,
    pub registered: usize,
    /// Checkpoint written at the end of the walk, if any.
    pub synced: Option<(NaiveDate, NaiveDate)>,
}

/// Last calendar day whose session is closed at `now`.
pub fn session_end(now: NaiveDateTime, cutoff_hour: u32) -> NaiveDate {
    if now.hour() < cutoff_hour {
        now.date() - chrono::Duration::days(1)
    } else {
        now.date()
    }
}

/// Weekdays in `start..=end`.
pub fn weekdays(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start
        .iter_days()
        .take_while(move |d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
}

struct ThrottledFeed {
    feed: Box<dyn DailyQuoteFeed>,
    throttle: FetchThrottle,
}

pub struct IngestionPipeline<'a> {
    store: &'a dyn QuoteStore,
    reference: &'a dyn ReferencePort,
    feeds: Vec<ThrottledFeed>,
    config: IngestConfig,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        store: &'a dyn QuoteStore,
        reference: &'a dyn ReferencePort,
        config: IngestConfig,
    ) -> Self {
        IngestionPipeline {
            store,
            reference,
            feeds: Vec::new(),
            config,
        }
    }

    /// Add a feed with its own throttle at the configured interval.
    pub fn with_feed(self, feed: Box<dyn DailyQuoteFeed>) -> Self {
        let throttle = FetchThrottle::new(self.config.min_fetch_interval);
        self.with_throttled_feed(feed, throttle)
    }

    pub fn with_throttled_feed(
        mut self,
        feed: Box<dyn DailyQuoteFeed>,
        throttle: FetchThrottle,
    ) -> Self {
        self.feeds.push(ThrottledFeed { feed, throttle });
        self
    }

    /// First day the next sync will fetch.
    fn walk_start(&self, now: NaiveDateTime) -> Result<NaiveDate, GapLedgerError> {
        Ok(match self.store.checkpoint()? {
            IngestionCheckpoint::Synced { end, .. } => end + chrono::Duration::days(1),
            IngestionCheckpoint::NeedsBackfill => {
                now.date() - chrono::Duration::days(self.config.backfill_days)
            }
        })
    }

    pub fn sync(&mut self, now: NaiveDateTime) -> Result<SyncReport, GapLedgerError> {
        let start = self.walk_start(now)?;
        let end = session_end(now, self.config.cutoff_hour);
        let mut report = SyncReport::default();

        if start > end {
            tracing::info!(%start, %end, "already up to date");
            return Ok(report);
        }

        tracing::info!(%start, %end, feeds = self.feeds.len(), "syncing");
        for date in weekdays(start, end) {
            self.ingest_day(date, &mut report)?;
            report.days_walked += 1;
        }

        self.store.set_checkpoint(start, end)?;
        report.synced = Some((start, end));
        tracing::info!(
            stored = report.stored,
            duplicates = report.duplicates,
            carried_forward = report.carried_forward,
            "sync complete"
        );
        Ok(report)
    }

    /// Fetch and store one day from every feed.
    pub fn ingest_day(
        &mut self,
        date: NaiveDate,
        report: &mut SyncReport,
    ) -> Result<(), GapLedgerError> {
        for i in 0..self.feeds.len() {
            let source = &mut self.feeds[i];
            source.throttle.wait();
            let day = source.feed.fetch_day(date)?;
            let name = source.feed.name().to_string();

            match day {
                FeedDay::NoData => {
                    tracing::debug!(feed = %name, %date, "no data");
                    report.days_without_data += 1;
                }
                FeedDay::Rows(rows) => {
                    tracing::info!(feed = %name, %date, rows = rows.len(), "fetched");
                    for row in &rows {
                        self.store_row(row, date, report)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn store_row(
        &self,
        row: &RawQuoteRow,
        date: NaiveDate,
        report: &mut SyncReport,
    ) -> Result<(), GapLedgerError> {
        let code = row.code.trim();
        if self.config.exclusions.is_excluded(code) {
            report.excluded += 1;
            return Ok(());
        }

        let mut quote = normalize_row(row, date).map_err(|e| GapLedgerError::MalformedRow {
            code: code.to_string(),
            date,
            reason: e.to_string(),
        })?;

        if quote.volume == 0 {
            match self.store.find_prior_to(code, date) {
                Ok(prior) => {
                    quote.carry_forward_from(&prior);
                    report.carried_forward += 1;
                }
                Err(GapLedgerError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        match self.store.append(code, &quote) {
            Ok(()) => report.stored += 1,
            Err(GapLedgerError::DuplicateDate { .. }) => report.duplicates += 1,
            Err(e) => return Err(e),
        }

        self.register_name(code, row.name.trim(), report)
    }

    fn register_name(
        &self,
        code: &str,
        name: &str,
        report: &mut SyncReport,
    ) -> Result<(), GapLedgerError> {
        match self.reference.name_for(code) {
            Ok(_) => return Ok(()),
            Err(GapLedgerError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        if name.is_empty() {
            return Ok(());
        }
        match self.reference.register(code, name) {
            Ok(()) => {
                report.registered += 1;
                Ok(())
            }
            Err(e @ GapLedgerError::DuplicateCode { .. }) => {
                tracing::warn!(%code, %name, error = %e, "name already registered");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
