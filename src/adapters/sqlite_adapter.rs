//! SQLite adapter for quotes, the checkpoint, names and transactions.

use crate::domain::error::GapLedgerError;
use crate::domain::ledger::{Direction, Transaction};
use crate::domain::quote::{IngestionCheckpoint, Quote};
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::TransactionLog;
use crate::ports::quote_store_port::QuoteStore;
use crate::ports::reference_port::ReferencePort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, ErrorCode, OptionalExtension};

const DATE_FORMAT: &str = "%Y-%m-%d";

const QUOTE_COLUMNS: &str = "date, volume, trades, value, open, high, low, close,
     last_bid_price, last_bid_volume, last_ask_price, last_ask_volume, pe_ratio";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> GapLedgerError {
    GapLedgerError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation)
}

fn date_to_sql(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn date_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let date_str: String = row.get(idx)?;
    NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn direction_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Direction> {
    let direction: String = row.get(idx)?;
    match direction.as_str() {
        "buy" => Ok(Direction::Buy),
        "sell" => Ok(Direction::Sell),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown direction {other:?}").into(),
        )),
    }
}

fn quote_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Quote> {
    Ok(Quote {
        date: date_column(row, 0)?,
        volume: row.get(1)?,
        trades: row.get(2)?,
        value: row.get(3)?,
        open: row.get(4)?,
        high: row.get(5)?,
        low: row.get(6)?,
        close: row.get(7)?,
        last_bid_price: row.get(8)?,
        last_bid_volume: row.get(9)?,
        last_ask_price: row.get(10)?,
        last_ask_volume: row.get(11)?,
        pe_ratio: row.get(12)?,
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, GapLedgerError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| GapLedgerError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4);
        if pool_size <= 0 {
            return Err(GapLedgerError::ConfigInvalid {
                section: "sqlite".into(),
                key: "pool_size".into(),
                reason: "pool_size must be positive".into(),
            });
        }

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size as u32)
            .build(manager)
            .map_err(|e: r2d2::Error| GapLedgerError::Database {
                reason: e.to_string(),
            })?;

        tracing::debug!(path = %db_path, pool_size, "opened sqlite pool");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, GapLedgerError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| GapLedgerError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, GapLedgerError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| GapLedgerError::Database {
                reason: e.to_string(),
            })
    }

    pub fn initialize_schema(&self) -> Result<(), GapLedgerError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS quotes (
                code TEXT NOT NULL,
                date TEXT NOT NULL,
                volume INTEGER NOT NULL,
                trades INTEGER NOT NULL,
                value INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                last_bid_price REAL,
                last_bid_volume INTEGER,
                last_ask_price REAL,
                last_ask_volume INTEGER,
                pe_ratio REAL,
                PRIMARY KEY (code, date)
            );
            CREATE INDEX IF NOT EXISTS idx_quotes_date ON quotes(date);
            CREATE TABLE IF NOT EXISTS checkpoint (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS reference (
                code TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL,
                date TEXT NOT NULL,
                direction TEXT NOT NULL CHECK (direction IN ('buy', 'sell')),
                price REAL NOT NULL,
                quantity INTEGER NOT NULL,
                fee INTEGER NOT NULL,
                tax INTEGER NOT NULL,
                gross_amount INTEGER NOT NULL,
                net_amount INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);",
        )
        .map_err(query_err)?;

        Ok(())
    }
}

impl QuoteStore for SqliteAdapter {
    fn append(&self, security: &str, quote: &Quote) -> Result<(), GapLedgerError> {
        let conn = self.conn()?;
        let result = conn.execute(
            &format!("INSERT INTO quotes (code, {QUOTE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"),
            params![
                security,
                date_to_sql(quote.date),
                quote.volume,
                quote.trades,
                quote.value,
                quote.open,
                quote.high,
                quote.low,
                quote.close,
                quote.last_bid_price,
                quote.last_bid_volume,
                quote.last_ask_price,
                quote.last_ask_volume,
                quote.pe_ratio
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(GapLedgerError::DuplicateDate {
                code: security.to_string(),
                date: quote.date,
            }),
            Err(e) => Err(query_err(e)),
        }
    }

    fn most_recent(&self, security: &str, n: usize) -> Result<Vec<Quote>, GapLedgerError> {
        let conn = self.conn()?;

        let exists = conn
            .query_row(
                "SELECT 1 FROM quotes WHERE code = ?1 LIMIT 1",
                params![security],
                |_| Ok(()),
            )
            .optional()
            .map_err(query_err)?;
        if exists.is_none() {
            return Err(GapLedgerError::UnknownSecurity {
                code: security.to_string(),
            });
        }

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {QUOTE_COLUMNS} FROM quotes WHERE code = ?1 ORDER BY date DESC LIMIT ?2"
            ))
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![security, n as i64], quote_from_row)
            .map_err(query_err)?;

        let mut quotes = rows.collect::<Result<Vec<_>, _>>().map_err(query_err)?;
        quotes.reverse();
        Ok(quotes)
    }

    fn find_prior_to(&self, security: &str, date: NaiveDate) -> Result<Quote, GapLedgerError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {QUOTE_COLUMNS} FROM quotes WHERE code = ?1 AND date < ?2
                 ORDER BY date DESC LIMIT 1"
            ),
            params![security, date_to_sql(date)],
            quote_from_row,
        )
        .optional()
        .map_err(query_err)?
        .ok_or_else(|| GapLedgerError::NotFound {
            what: format!("quote for {security} before {date}"),
        })
    }

    fn list_securities(&self) -> Result<Vec<String>, GapLedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT code FROM quotes ORDER BY code")
            .map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_err)
    }

    fn checkpoint(&self) -> Result<IngestionCheckpoint, GapLedgerError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT start_date, end_date FROM checkpoint WHERE id = 1",
                [],
                |row| Ok((date_column(row, 0)?, date_column(row, 1)?)),
            )
            .optional()
            .map_err(query_err)?;

        Ok(match row {
            Some((start, end)) => IngestionCheckpoint::Synced { start, end },
            None => IngestionCheckpoint::NeedsBackfill,
        })
    }

    fn set_checkpoint(&self, start: NaiveDate, end: NaiveDate) -> Result<(), GapLedgerError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO checkpoint (id, start_date, end_date) VALUES (1, ?1, ?2)",
            params![date_to_sql(start), date_to_sql(end)],
        )
        .map_err(query_err)?;
        Ok(())
    }
}

impl ReferencePort for SqliteAdapter {
    fn name_for(&self, code: &str) -> Result<String, GapLedgerError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT name FROM reference WHERE code = ?1",
            params![code],
            |row| row.get(0),
        )
        .optional()
        .map_err(query_err)?
        .ok_or_else(|| GapLedgerError::NotFound {
            what: format!("name for {code}"),
        })
    }

    fn code_for(&self, name: &str) -> Result<String, GapLedgerError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT code FROM reference WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()
        .map_err(query_err)?
        .ok_or_else(|| GapLedgerError::NotFound {
            what: format!("code for {name}"),
        })
    }

    fn register(&self, code: &str, name: &str) -> Result<(), GapLedgerError> {
        match self.code_for(name) {
            Ok(existing) if existing == code => return Ok(()),
            Ok(existing) => {
                return Err(GapLedgerError::DuplicateCode {
                    name: name.to_string(),
                    existing,
                });
            }
            Err(GapLedgerError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO reference (code, name) VALUES (?1, ?2)",
            params![code, name],
        )
        .map_err(query_err)?;
        Ok(())
    }
}

impl TransactionLog for SqliteAdapter {
    fn append_transaction(&self, transaction: &Transaction) -> Result<(), GapLedgerError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO transactions
                (code, date, direction, price, quantity, fee, tax, gross_amount, net_amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                transaction.security,
                date_to_sql(transaction.date),
                transaction.direction.to_string(),
                transaction.price,
                transaction.quantity,
                transaction.fee,
                transaction.tax,
                transaction.gross_amount,
                transaction.net_amount
            ],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn transactions(&self) -> Result<Vec<Transaction>, GapLedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT code, date, direction, price, quantity, fee, tax, gross_amount, net_amount
                 FROM transactions ORDER BY date ASC, id ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Transaction {
                    security: row.get(0)?,
                    date: date_column(row, 1)?,
                    direction: direction_column(row, 2)?,
                    price: row.get(3)?,
                    quantity: row.get(4)?,
                    fee: row.get(5)?,
                    tax: row.get(6)?,
                    gross_amount: row.get(7)?,
                    net_amount: row.get(8)?,
                })
            })
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }
}
