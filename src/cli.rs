//! CLI definition and dispatch.

use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{load_ingest_config, load_scan_config, load_tax_policy};
use crate::domain::error::GapLedgerError;
use crate::domain::ingestion::{IngestionPipeline, SyncReport};
use crate::domain::ledger::{Direction, Ledger, Transaction};
use crate::domain::report::{gains_report, holdings_snapshot, trailing_start};
use crate::domain::scanner::{scan_universe, GapVariant, ScanOp, ScanPage, Side};
use crate::domain::transaction_entry::import_entries;
use crate::ports::config_port::ConfigPort;
use crate::ports::feed_port::DailyQuoteFeed;
use crate::ports::ledger_port::TransactionLog;
use crate::ports::quote_store_port::QuoteStore;
use crate::ports::reference_port::ReferencePort;

#[derive(Parser, Debug)]
#[command(
    name = "gapledger",
    about = "Daily quote ingestion, gap scanning and FIFO gain ledger"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScanOpArg {
    Gap,
    GapBody,
    VolumeBurst,
}

impl From<ScanOpArg> for ScanOp {
    fn from(op: ScanOpArg) -> Self {
        match op {
            ScanOpArg::Gap => ScanOp::Gap(GapVariant::Wick),
            ScanOpArg::GapBody => ScanOp::Gap(GapVariant::Body),
            ScanOpArg::VolumeBurst => ScanOp::VolumeBurst,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SideArg {
    Call,
    Put,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Call => Side::Call,
            SideArg::Put => Side::Put,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    Buy,
    Sell,
}

impl From<DirectionArg> for Direction {
    fn from(d: DirectionArg) -> Self {
        match d {
            DirectionArg::Buy => Direction::Buy,
            DirectionArg::Sell => Direction::Sell,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch every closed session since the last sync
    Sync {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Scan the stored universe for gaps or volume bursts
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, value_enum, default_value_t = ScanOpArg::Gap)]
        op: ScanOpArg,
        #[arg(long, value_enum)]
        side: Option<SideArg>,
        /// Resume from this index into the security list
        #[arg(long, default_value_t = 0)]
        next: usize,
        /// Sync before scanning
        #[arg(long)]
        sync: bool,
        /// Print the full page, chart series included, as JSON
        #[arg(long)]
        json: bool,
    },
    /// Register a display name for a security code
    AddRef {
        #[arg(short, long)]
        config: PathBuf,
        code: String,
        name: String,
    },
    /// Record a single transaction
    AddTransaction {
        #[arg(short, long)]
        config: PathBuf,
        /// YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, value_enum)]
        side: DirectionArg,
        #[arg(long)]
        code: String,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        quantity: i64,
        #[arg(long, default_value_t = 0)]
        fee: i64,
    },
    /// Import tab-separated broker statement lines
    ImportTransactions {
        #[arg(short, long)]
        config: PathBuf,
        file: PathBuf,
        /// Year for MMDD dates (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
    },
    /// Realized gains per security over the trailing months
    Gains {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value_t = 12)]
        months: u32,
    },
    /// Open positions valued at the latest close
    Holdings {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the name and recent quotes of a security
    Info {
        #[arg(short, long)]
        config: PathBuf,
        code: String,
        #[arg(long, default_value_t = 5)]
        days: usize,
    },
}

/// Everything the commands persist to.
pub trait Backend {
    fn quotes(&self) -> &dyn QuoteStore;
    fn reference(&self) -> &dyn ReferencePort;
    fn log(&self) -> &dyn TransactionLog;
}

impl<T: QuoteStore + ReferencePort + TransactionLog> Backend for T {
    fn quotes(&self) -> &dyn QuoteStore {
        self
    }
    fn reference(&self) -> &dyn ReferencePort {
        self
    }
    fn log(&self) -> &dyn TransactionLog {
        self
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Sync { config } => run_sync(&config),
        Command::Scan {
            config,
            op,
            side,
            next,
            sync,
            json,
        } => run_scan(&config, op.into(), side.map(Side::from), next, sync, json),
        Command::AddRef { config, code, name } => run_add_ref(&config, &code, &name),
        Command::AddTransaction {
            config,
            date,
            side,
            code,
            price,
            quantity,
            fee,
        } => run_add_transaction(&config, date, side.into(), &code, price, quantity, fee),
        Command::ImportTransactions { config, file, year } => {
            run_import(&config, &file, year.unwrap_or_else(|| Local::now().year()))
        }
        Command::Gains { config, months } => run_gains(&config, months),
        Command::Holdings { config } => run_holdings(&config),
        Command::Info { config, code, days } => run_info(&config, &code, days),
    }
}

fn fail(err: GapLedgerError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, GapLedgerError> {
    FileConfigAdapter::from_file(path).map_err(|e| GapLedgerError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn open_backend(config: &dyn ConfigPort) -> Result<Box<dyn Backend>, GapLedgerError> {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let adapter = SqliteAdapter::from_config(config)?;
        adapter.initialize_schema()?;
        Ok(Box::new(adapter))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config;
        Err(GapLedgerError::Database {
            reason: "sqlite feature is required".into(),
        })
    }
}

/// CSV directory when `ingest.csv_dir` is set, otherwise the exchange feeds.
pub fn build_feeds(config: &dyn ConfigPort) -> Result<Vec<Box<dyn DailyQuoteFeed>>, GapLedgerError> {
    if let Some(dir) = config.get_string("ingest", "csv_dir") {
        return Ok(vec![Box::new(CsvAdapter::new(PathBuf::from(dir)))]);
    }

    #[cfg(feature = "http-feed")]
    {
        use crate::adapters::exchange_feed::{Board, ExchangeFeed};

        let names = config
            .get_list("ingest", "feeds")
            .unwrap_or_else(|| vec!["twse".to_string(), "tpex".to_string()]);
        let mut feeds: Vec<Box<dyn DailyQuoteFeed>> = Vec::new();
        for name in &names {
            let board = Board::parse_name(name).ok_or_else(|| GapLedgerError::ConfigInvalid {
                section: "ingest".into(),
                key: "feeds".into(),
                reason: format!("unknown feed {name:?}"),
            })?;
            feeds.push(Box::new(ExchangeFeed::new(board)?));
        }
        Ok(feeds)
    }

    #[cfg(not(feature = "http-feed"))]
    {
        Err(GapLedgerError::ConfigMissing {
            section: "ingest".into(),
            key: "csv_dir".into(),
        })
    }
}

fn sync_backend(
    config: &dyn ConfigPort,
    backend: &dyn Backend,
) -> Result<SyncReport, GapLedgerError> {
    let ingest = load_ingest_config(config)?;
    let feeds = build_feeds(config)?;

    let mut pipeline = IngestionPipeline::new(backend.quotes(), backend.reference(), ingest);
    for feed in feeds {
        pipeline = pipeline.with_feed(feed);
    }
    pipeline.sync(Local::now().naive_local())
}

fn run_sync(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let result = load_config(config_path).and_then(|config| {
        let backend = open_backend(&config)?;
        sync_backend(&config, backend.as_ref())
    });

    match result {
        Ok(report) => {
            print_sync_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn print_sync_report(report: &SyncReport) {
    match report.synced {
        Some((start, end)) => eprintln!(
            "Synced {} to {}: {} days, {} quotes stored, {} already present, {} carried forward, {} excluded",
            start,
            end,
            report.days_walked,
            report.stored,
            report.duplicates,
            report.carried_forward,
            report.excluded
        ),
        None => eprintln!("Already up to date"),
    }
    if report.registered > 0 {
        eprintln!("{} new names registered", report.registered);
    }
}

fn run_scan(
    config_path: &Path,
    op: ScanOp,
    side: Option<Side>,
    start: usize,
    sync_first: bool,
    json: bool,
) -> ExitCode {
    let result = load_config(config_path).and_then(|config| {
        let scan_config = load_scan_config(&config)?;
        let backend = open_backend(&config)?;
        if sync_first {
            print_sync_report(&sync_backend(&config, backend.as_ref())?);
        }
        scan_universe(backend.quotes(), op, side, start, &scan_config)
    });

    let page = match result {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    if json {
        match serde_json::to_string_pretty(&page) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(1);
            }
        }
    } else {
        print_scan_page(&page);
    }
    ExitCode::SUCCESS
}

fn print_scan_page(page: &ScanPage) {
    for result in &page.results {
        let end = result
            .chart
            .end_date
            .map(|d| d.to_string())
            .unwrap_or_default();
        println!("{}\t{}\t{}", result.security(), result.info(), end);
    }
    eprintln!(
        "{} findings ({} call, {} put)",
        page.results.len(),
        page.call_count,
        page.put_count
    );
    if let Some(next) = page.next {
        eprintln!("More securities remain: rerun with --next {next}");
    }
}

fn run_add_ref(config_path: &Path, code: &str, name: &str) -> ExitCode {
    let result = load_config(config_path).and_then(|config| {
        let backend = open_backend(&config)?;
        backend.reference().register(code, name)
    });
    match result {
        Ok(()) => {
            eprintln!("Registered {code} as {name}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_add_transaction(
    config_path: &Path,
    date: NaiveDate,
    direction: Direction,
    code: &str,
    price: f64,
    quantity: i64,
    fee: i64,
) -> ExitCode {
    let result = load_config(config_path).and_then(|config| {
        let policy = load_tax_policy(&config)?;
        let tx = Transaction::new(code, date, direction, price, quantity, fee, &policy)?;
        let backend = open_backend(&config)?;
        backend.log().append_transaction(&tx)?;
        Ok(tx)
    });
    match result {
        Ok(tx) => {
            eprintln!(
                "Recorded {} {} x{} on {}: net {}",
                tx.direction, tx.security, tx.quantity, tx.date, tx.net_amount
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_import(config_path: &Path, file: &Path, year: i32) -> ExitCode {
    let result = load_config(config_path).and_then(|config| {
        let policy = load_tax_policy(&config)?;
        let text = fs::read_to_string(file)?;
        let backend = open_backend(&config)?;
        Ok(import_entries(
            &text,
            year,
            backend.reference(),
            backend.log(),
            &policy,
        ))
    });

    let report = match result {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    eprintln!("Imported {} transactions", report.imported.len());
    match report.stopped {
        None => ExitCode::SUCCESS,
        Some(stop) => {
            eprintln!("error: line {}: {}", stop.line, stop.error);
            eprintln!("Unprocessed input:");
            println!("{}", stop.remaining);
            (&stop.error).into()
        }
    }
}

fn replay(backend: &dyn Backend) -> Result<Ledger, GapLedgerError> {
    let log = backend.log().transactions()?;
    let ledger = Ledger::replay(&log);
    for issue in ledger.issues() {
        eprintln!(
            "warning: {} on {} sold {} more than recorded holdings",
            issue.security, issue.date, issue.unmatched
        );
    }
    Ok(ledger)
}

fn run_gains(config_path: &Path, months: u32) -> ExitCode {
    let since = trailing_start(Local::now().date_naive(), months);
    let result = load_config(config_path).and_then(|config| {
        let backend = open_backend(&config)?;
        let ledger = replay(backend.as_ref())?;
        gains_report(&ledger, since, backend.reference())
    });

    match result {
        Ok(lines) => {
            for line in &lines {
                println!("{}\t{}", line.label, line.net_gain);
            }
            let total: i64 = lines.iter().map(|l| l.net_gain).sum();
            eprintln!("Realized since {since}: {total}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_holdings(config_path: &Path) -> ExitCode {
    let result = load_config(config_path).and_then(|config| {
        let backend = open_backend(&config)?;
        let ledger = replay(backend.as_ref())?;
        holdings_snapshot(&ledger, backend.quotes(), backend.reference())
    });

    match result {
        Ok(lines) => {
            for line in &lines {
                let value = |v: Option<i64>| v.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    line.label,
                    line.quantity,
                    line.cost_basis,
                    value(line.market_value),
                    value(line.unrealized)
                );
            }
            eprintln!("{} open positions", lines.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_info(config_path: &Path, code: &str, days: usize) -> ExitCode {
    let result = load_config(config_path).and_then(|config| {
        let backend = open_backend(&config)?;
        let name = match backend.reference().name_for(code) {
            Ok(n) => Some(n),
            Err(GapLedgerError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };
        let quotes = backend.quotes().most_recent(code, days)?;
        Ok((name, quotes))
    });

    match result {
        Ok((name, quotes)) => {
            println!("{} {}", code, name.as_deref().unwrap_or("(no name)"));
            for q in &quotes {
                println!(
                    "{}\tO {:.2}\tH {:.2}\tL {:.2}\tC {:.2}\tV {}",
                    q.date, q.open, q.high, q.low, q.close, q.volume
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}
