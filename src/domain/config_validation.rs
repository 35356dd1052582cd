//! Configuration loading and validation.
//!
//! Every tunable has a default; a present value out of range is
//! `ConfigInvalid`.

use crate::domain::error::GapLedgerError;
use crate::domain::ingestion::IngestConfig;
use crate::domain::ledger::TaxPolicy;
use crate::domain::normalize::ExclusionRules;
use crate::domain::scanner::ScanConfig;
use crate::ports::config_port::ConfigPort;
use std::time::Duration;

fn invalid(section: &str, key: &str, reason: &str) -> GapLedgerError {
    GapLedgerError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn positive_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, GapLedgerError> {
    let value = config.get_int(section, key, default as i64);
    if value <= 0 {
        return Err(invalid(section, key, &format!("{key} must be positive")));
    }
    Ok(value as usize)
}

pub fn load_scan_config(config: &dyn ConfigPort) -> Result<ScanConfig, GapLedgerError> {
    let defaults = ScanConfig::default();

    let base_days = positive_usize(config, "scan", "base_days", defaults.base_days)?;
    let interval = positive_usize(config, "scan", "interval", defaults.interval)?;
    let closure_window = positive_usize(config, "scan", "closure_window", defaults.closure_window)?;
    let open_recency = positive_usize(config, "scan", "open_recency", defaults.open_recency)?;
    let max_findings = positive_usize(config, "scan", "max_findings", defaults.max_findings)?;

    let liquidity_floor = config.get_int("scan", "liquidity_floor", defaults.liquidity_floor);
    if liquidity_floor < 0 {
        return Err(invalid(
            "scan",
            "liquidity_floor",
            "liquidity_floor must be non-negative",
        ));
    }

    let gap_margin = config.get_double("scan", "gap_margin", defaults.gap_margin);
    if gap_margin < 1.0 {
        return Err(invalid("scan", "gap_margin", "gap_margin must be at least 1.0"));
    }

    let burst_multiplier = config.get_double("scan", "burst_multiplier", defaults.burst_multiplier);
    if burst_multiplier <= 1.0 {
        return Err(invalid(
            "scan",
            "burst_multiplier",
            "burst_multiplier must be greater than 1.0",
        ));
    }

    let shadow_ratio = config.get_double("scan", "shadow_ratio", defaults.shadow_ratio);
    if shadow_ratio < 0.0 {
        return Err(invalid(
            "scan",
            "shadow_ratio",
            "shadow_ratio must be non-negative",
        ));
    }

    let longest_ma = defaults.ma_windows.iter().copied().max().unwrap_or(0);
    if base_days + interval < longest_ma {
        return Err(invalid(
            "scan",
            "base_days",
            &format!("base_days + interval must cover the {longest_ma}-day average"),
        ));
    }

    Ok(ScanConfig {
        base_days,
        interval,
        liquidity_floor,
        gap_margin,
        closure_window,
        open_recency,
        burst_multiplier,
        shadow_ratio,
        max_findings,
        ma_windows: defaults.ma_windows,
    })
}

pub fn load_ingest_config(config: &dyn ConfigPort) -> Result<IngestConfig, GapLedgerError> {
    let defaults = IngestConfig::default();

    let cutoff_hour = config.get_int("ingest", "cutoff_hour", defaults.cutoff_hour as i64);
    if !(0..=24).contains(&cutoff_hour) {
        return Err(invalid(
            "ingest",
            "cutoff_hour",
            "cutoff_hour must be between 0 and 24",
        ));
    }

    let backfill_days = config.get_int("ingest", "backfill_days", defaults.backfill_days);
    if backfill_days <= 0 {
        return Err(invalid(
            "ingest",
            "backfill_days",
            "backfill_days must be positive",
        ));
    }

    let interval_ms = config.get_int(
        "ingest",
        "min_fetch_interval_ms",
        defaults.min_fetch_interval.as_millis() as i64,
    );
    if interval_ms < 0 {
        return Err(invalid(
            "ingest",
            "min_fetch_interval_ms",
            "min_fetch_interval_ms must be non-negative",
        ));
    }

    let exclusions = match config.get_list("ingest", "exclusions") {
        None => defaults.exclusions,
        Some(patterns) => ExclusionRules::from_patterns(&patterns)
            .map_err(|e| invalid("ingest", "exclusions", &e.to_string()))?,
    };

    Ok(IngestConfig {
        cutoff_hour: cutoff_hour as u32,
        backfill_days,
        min_fetch_interval: Duration::from_millis(interval_ms as u64),
        exclusions,
    })
}

pub fn load_tax_policy(config: &dyn ConfigPort) -> Result<TaxPolicy, GapLedgerError> {
    let rate = config.get_double("ledger", "sell_tax_rate", TaxPolicy::default().sell_tax_rate);
    if !(0.0..1.0).contains(&rate) {
        return Err(invalid(
            "ledger",
            "sell_tax_rate",
            "sell_tax_rate must be between 0 and 1",
        ));
    }
    Ok(TaxPolicy {
        sell_tax_rate: rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct TestConfig {
        values: HashMap<(String, String), String>,
    }

    impl TestConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            let values = entries
                .iter()
                .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                .collect();
            TestConfig { values }
        }
    }

    impl ConfigPort for TestConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.values
                .get(&(section.to_string(), key.to_string()))
                .cloned()
        }

        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
    }

    fn assert_invalid(err: GapLedgerError, expected_key: &str) {
        match err {
            GapLedgerError::ConfigInvalid { key, .. } => assert_eq!(key, expected_key),
            other => panic!("expected ConfigInvalid for {expected_key}, got {other:?}"),
        }
    }

    #[test]
    fn empty_config_gives_defaults() {
        let config = TestConfig::new(&[]);
        assert_eq!(load_scan_config(&config).unwrap(), ScanConfig::default());
        assert_eq!(load_ingest_config(&config).unwrap(), IngestConfig::default());
        assert_eq!(load_tax_policy(&config).unwrap(), TaxPolicy::default());
    }

    #[test]
    fn overrides_are_read() {
        let config = TestConfig::new(&[
            ("scan", "base_days", "25"),
            ("scan", "liquidity_floor", "1000"),
            ("scan", "gap_margin", "1.015"),
            ("ingest", "min_fetch_interval_ms", "500"),
            ("ingest", "exclusions", "9[0-9][0-9][0-9]"),
            ("ledger", "sell_tax_rate", "0.0015"),
        ]);
        let scan = load_scan_config(&config).unwrap();
        assert_eq!(scan.base_days, 25);
        assert_eq!(scan.window_len(), 45);
        assert_eq!(scan.liquidity_floor, 1000);
        assert_eq!(scan.gap_margin, 1.015);

        let ingest = load_ingest_config(&config).unwrap();
        assert_eq!(ingest.min_fetch_interval, Duration::from_millis(500));
        assert!(ingest.exclusions.is_excluded("9123"));
        assert!(!ingest.exclusions.is_excluded("030001"));

        assert_eq!(load_tax_policy(&config).unwrap().sell_tax_rate, 0.0015);
    }

    #[test]
    fn rejects_zero_interval() {
        let config = TestConfig::new(&[("scan", "interval", "0")]);
        assert_invalid(load_scan_config(&config).unwrap_err(), "interval");
    }

    #[test]
    fn rejects_margin_below_one() {
        let config = TestConfig::new(&[("scan", "gap_margin", "0.98")]);
        assert_invalid(load_scan_config(&config).unwrap_err(), "gap_margin");
    }

    #[test]
    fn rejects_window_shorter_than_longest_average() {
        let config = TestConfig::new(&[("scan", "base_days", "5"), ("scan", "interval", "5")]);
        assert_invalid(load_scan_config(&config).unwrap_err(), "base_days");
    }

    #[test]
    fn rejects_bad_cutoff_hour() {
        let config = TestConfig::new(&[("ingest", "cutoff_hour", "25")]);
        assert_invalid(load_ingest_config(&config).unwrap_err(), "cutoff_hour");
    }

    #[test]
    fn rejects_malformed_exclusion_pattern() {
        let config = TestConfig::new(&[("ingest", "exclusions", "02[0-9")]);
        assert_invalid(load_ingest_config(&config).unwrap_err(), "exclusions");
    }

    #[test]
    fn anchored_exclusion_rules_apply() {
        let config = TestConfig::new(&[(
            "ingest",
            "exclusions",
            r"^02[0-9]{4}$, ^7[0-3]\d{3}[PFQCBXY]$",
        )]);
        let ingest = load_ingest_config(&config).unwrap();
        assert!(ingest.exclusions.is_excluded("020012"));
        assert!(ingest.exclusions.is_excluded("70123Y"));
        assert!(!ingest.exclusions.is_excluded("2330"));
    }

    #[test]
    fn rejects_unbalanced_exclusion_group() {
        let config = TestConfig::new(&[("ingest", "exclusions", "^(02[0-9]{4}$")]);
        assert_invalid(load_ingest_config(&config).unwrap_err(), "exclusions");
    }

    #[test]
    fn rejects_tax_rate_out_of_range() {
        let config = TestConfig::new(&[("ledger", "sell_tax_rate", "1.5")]);
        assert_invalid(load_tax_policy(&config).unwrap_err(), "sell_tax_rate");
    }
}
