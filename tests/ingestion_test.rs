mod common;

use common::*;
use gapledger::adapters::memory_adapter::MemoryAdapter;
use gapledger::domain::error::GapLedgerError;
use gapledger::domain::ingestion::{FetchThrottle, IngestionPipeline};
use gapledger::domain::quote::IngestionCheckpoint;
use gapledger::ports::quote_store_port::QuoteStore;
use gapledger::ports::reference_port::ReferencePort;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

fn week_feed() -> MockFeed {
    MockFeed::new("mock")
        .with_day(
            june(3),
            vec![
                raw_row("2330", "台積電", "25,000", ["580", "585", "575", "583"]),
                raw_row("1101", "台泥", "1,200", ["33.1", "33.5", "32.9", "33.2"]),
            ],
        )
        .with_day(
            june(4),
            vec![
                raw_row("2330", "台積電", "20,000", ["583", "590", "582", "588"]),
                halted_row("1101", "台泥"),
            ],
        )
}

/// Checkpoint ending Sunday 2024-06-02 so the walk starts Monday.
fn synced_store() -> MemoryAdapter {
    let store = MemoryAdapter::new();
    store.set_checkpoint(june(1), june(2)).unwrap();
    store
}

#[test]
fn sync_stores_rows_and_advances_checkpoint() {
    let store = synced_store();
    let mut pipeline = IngestionPipeline::new(&store, &store, fast_ingest())
        .with_feed(Box::new(week_feed()));

    let report = pipeline.sync(at(june(7), 16)).unwrap();

    assert_eq!(report.days_walked, 5);
    assert_eq!(report.days_without_data, 3);
    assert_eq!(report.stored, 4);
    assert_eq!(report.carried_forward, 1);
    assert_eq!(report.synced, Some((june(3), june(7))));
    assert_eq!(
        store.checkpoint().unwrap(),
        IngestionCheckpoint::Synced {
            start: june(3),
            end: june(7)
        }
    );
    assert_eq!(store.list_securities().unwrap(), vec!["1101", "2330"]);
}

#[test]
fn halted_day_carries_previous_close() {
    let store = synced_store();
    let mut pipeline = IngestionPipeline::new(&store, &store, fast_ingest())
        .with_feed(Box::new(week_feed()));
    pipeline.sync(at(june(7), 16)).unwrap();

    let quotes = store.most_recent("1101", 2).unwrap();
    let halted = &quotes[1];
    assert_eq!(halted.date, june(4));
    assert_eq!(halted.volume, 0);
    assert_eq!(halted.open, 33.2);
    assert_eq!(halted.high, 33.2);
    assert_eq!(halted.low, 33.2);
    assert_eq!(halted.close, 33.2);
}

#[test]
fn halted_without_history_stays_zero() {
    let store = synced_store();
    let feed = MockFeed::new("mock").with_day(june(3), vec![halted_row("9910", "豐泰")]);
    let mut pipeline =
        IngestionPipeline::new(&store, &store, fast_ingest()).with_feed(Box::new(feed));

    let report = pipeline.sync(at(june(3), 16)).unwrap();
    assert_eq!(report.carried_forward, 0);
    assert_eq!(store.most_recent("9910", 1).unwrap()[0].close, 0.0);
}

#[test]
fn second_sync_is_a_no_op() {
    let store = synced_store();
    let feed = week_feed();
    let calls = feed.counter();
    let mut pipeline =
        IngestionPipeline::new(&store, &store, fast_ingest()).with_feed(Box::new(feed));

    pipeline.sync(at(june(7), 16)).unwrap();
    let fetched = calls.load(Ordering::SeqCst);
    let stored = store.quote_count();

    let report = pipeline.sync(at(june(7), 18)).unwrap();
    assert_eq!(report.synced, None);
    assert_eq!(report.days_walked, 0);
    assert_eq!(calls.load(Ordering::SeqCst), fetched);
    assert_eq!(store.quote_count(), stored);
}

#[test]
fn refetching_stored_days_counts_duplicates() {
    let store = MemoryAdapter::new();
    let mut first =
        IngestionPipeline::new(&store, &store, fast_ingest()).with_feed(Box::new(week_feed()));
    first.sync(at(june(7), 16)).unwrap();
    let stored = store.quote_count();

    // Rewind the checkpoint to force the same week again.
    store.set_checkpoint(june(1), june(2)).unwrap();
    let mut second =
        IngestionPipeline::new(&store, &store, fast_ingest()).with_feed(Box::new(week_feed()));
    let report = second.sync(at(june(7), 16)).unwrap();

    assert_eq!(report.stored, 0);
    assert_eq!(report.duplicates, 4);
    assert_eq!(store.quote_count(), stored);
}

#[test]
fn before_cutoff_today_is_not_fetched() {
    let store = synced_store();
    let feed = week_feed();
    let calls = feed.counter();
    let mut pipeline =
        IngestionPipeline::new(&store, &store, fast_ingest()).with_feed(Box::new(feed));

    let report = pipeline.sync(at(june(4), 10)).unwrap();
    assert_eq!(report.synced, Some((june(3), june(3))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.most_recent("2330", 5).unwrap().len(), 1);
}

#[test]
fn transport_failure_leaves_checkpoint() {
    let store = synced_store();
    let feed = week_feed().failing_on(june(5));
    let mut pipeline =
        IngestionPipeline::new(&store, &store, fast_ingest()).with_feed(Box::new(feed));

    let err = pipeline.sync(at(june(7), 16)).unwrap_err();
    assert!(matches!(err, GapLedgerError::Transport { .. }));
    assert_eq!(
        store.checkpoint().unwrap(),
        IngestionCheckpoint::Synced {
            start: june(1),
            end: june(2)
        }
    );
    // Days before the failure stay stored; a retry treats them as duplicates.
    assert_eq!(store.quote_count(), 4);
}

#[test]
fn malformed_row_aborts_sync() {
    let store = synced_store();
    let feed = MockFeed::new("mock").with_day(
        june(3),
        vec![raw_row("2330", "台積電", "12x", ["580", "585", "575", "583"])],
    );
    let mut pipeline =
        IngestionPipeline::new(&store, &store, fast_ingest()).with_feed(Box::new(feed));

    match pipeline.sync(at(june(3), 16)) {
        Err(GapLedgerError::MalformedRow { code, date, .. }) => {
            assert_eq!(code, "2330");
            assert_eq!(date, june(3));
        }
        other => panic!("expected malformed row, got {other:?}"),
    }
    assert_eq!(store.quote_count(), 0);
}

#[test]
fn excluded_codes_are_skipped() {
    let store = synced_store();
    let feed = MockFeed::new("mock").with_day(
        june(3),
        vec![
            raw_row("020012", "富邦特選", "500", ["20", "20", "20", "20"]),
            raw_row("030001", "權證", "500", ["1", "1", "1", "1"]),
            raw_row("2330", "台積電", "25,000", ["580", "585", "575", "583"]),
        ],
    );
    let mut pipeline =
        IngestionPipeline::new(&store, &store, fast_ingest()).with_feed(Box::new(feed));

    let report = pipeline.sync(at(june(3), 16)).unwrap();
    assert_eq!(report.excluded, 2);
    assert_eq!(report.stored, 1);
    assert_eq!(store.list_securities().unwrap(), vec!["2330"]);
}

#[test]
fn names_are_registered_once() {
    let store = synced_store();
    let mut pipeline = IngestionPipeline::new(&store, &store, fast_ingest())
        .with_feed(Box::new(week_feed()));

    let report = pipeline.sync(at(june(7), 16)).unwrap();
    assert_eq!(report.registered, 2);
    assert_eq!(store.name_for("2330").unwrap(), "台積電");
    assert_eq!(store.code_for("台泥").unwrap(), "1101");
}

#[test]
fn conflicting_name_does_not_fail_sync() {
    let store = synced_store();
    store.register("2330", "台積電").unwrap();
    let feed = MockFeed::new("mock").with_day(
        june(3),
        vec![raw_row("2331", "台積電", "100", ["10", "10", "10", "10"])],
    );
    let mut pipeline =
        IngestionPipeline::new(&store, &store, fast_ingest()).with_feed(Box::new(feed));

    let report = pipeline.sync(at(june(3), 16)).unwrap();
    assert_eq!(report.stored, 1);
    assert_eq!(report.registered, 0);
    assert!(store.name_for("2331").is_err());
}

#[test]
fn feeds_are_consulted_in_order() {
    let store = synced_store();
    let listed = MockFeed::new("listed").with_day(
        june(3),
        vec![raw_row("2330", "台積電", "100", ["10", "10", "10", "10"])],
    );
    let otc = MockFeed::new("otc").with_day(
        june(3),
        vec![raw_row("6488", "環球晶", "100", ["20", "20", "20", "20"])],
    );
    let listed_calls = listed.counter();
    let otc_calls = otc.counter();
    let mut pipeline = IngestionPipeline::new(&store, &store, fast_ingest())
        .with_feed(Box::new(listed))
        .with_feed(Box::new(otc));

    pipeline.sync(at(june(3), 16)).unwrap();
    assert_eq!(listed_calls.load(Ordering::SeqCst), 1);
    assert_eq!(otc_calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.list_securities().unwrap(), vec!["2330", "6488"]);
}

#[test]
fn throttle_spaces_fetches() {
    let store = synced_store();
    let mut pipeline = IngestionPipeline::new(&store, &store, fast_ingest()).with_throttled_feed(
        Box::new(week_feed()),
        FetchThrottle::new(Duration::from_millis(30)),
    );

    let began = Instant::now();
    pipeline.sync(at(june(5), 16)).unwrap();
    // Three fetches, two enforced gaps.
    assert!(began.elapsed() >= Duration::from_millis(60));
}

#[test]
fn first_sync_backfills() {
    let store = MemoryAdapter::new();
    let feed = MockFeed::new("mock");
    let calls = feed.counter();
    let config = gapledger::domain::ingestion::IngestConfig {
        backfill_days: 14,
        ..fast_ingest()
    };
    let mut pipeline = IngestionPipeline::new(&store, &store, config).with_feed(Box::new(feed));

    let report = pipeline.sync(at(june(17), 16)).unwrap();
    assert_eq!(report.synced, Some((june(3), june(17))));
    assert_eq!(report.days_walked, 11);
    assert_eq!(calls.load(Ordering::SeqCst), 11);
}
