//! SQLite bar store.
//!
//! One `ohlcv` table keyed by `(asset, date)`. Dates are stored as
//! `YYYY-MM-DD` text so lexical order is date order.

use crate::domain::bar::OhlcvBar;
use crate::domain::error::NavtraderError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> NavtraderError {
    NavtraderError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> NavtraderError {
    NavtraderError::Database {
        reason: e.to_string(),
    }
}

fn parse_date(text: &str) -> Result<NaiveDate, NavtraderError> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|e| NavtraderError::Database {
        reason: format!("bad stored date '{text}': {e}"),
    })
}

impl SqliteAdapter {
    pub fn open(path: &Path, pool_size: u32) -> Result<Self, NavtraderError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, NavtraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, NavtraderError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), NavtraderError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS ohlcv (
                    asset TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume REAL NOT NULL,
                    PRIMARY KEY (asset, date)
                );
                CREATE INDEX IF NOT EXISTS idx_ohlcv_date ON ohlcv(date);",
            )
            .map_err(query_error)
    }

    /// Upserts `bars` in one transaction. Returns the number of rows written.
    pub fn insert_bars(&self, bars: &[OhlcvBar]) -> Result<usize, NavtraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO ohlcv (asset, date, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(query_error)?;
            for bar in bars {
                stmt.execute(params![
                    bar.asset,
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ])
                .map_err(query_error)?;
            }
        }
        tx.commit().map_err(query_error)?;
        Ok(bars.len())
    }

    /// First date, last date, and row count stored for `asset`.
    pub fn data_range(
        &self,
        asset: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, NavtraderError> {
        let (min, max, count): (Option<String>, Option<String>, i64) = self
            .conn()?
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM ohlcv WHERE asset = ?1",
                params![asset],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_error)?;

        match (min, max) {
            (Some(min), Some(max)) if count > 0 => {
                Ok(Some((parse_date(&min)?, parse_date(&max)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_ohlcv(
        &self,
        asset: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, NavtraderError> {
        let conn = self.conn()?;
        let start = start_date.map(|d| d.format(DATE_FORMAT).to_string());
        let end = end_date.map(|d| d.format(DATE_FORMAT).to_string());

        let mut stmt = conn
            .prepare(
                "SELECT date, open, high, low, close, volume
                 FROM ohlcv
                 WHERE asset = ?1
                   AND (?2 IS NULL OR date >= ?2)
                   AND (?3 IS NULL OR date <= ?3)
                 ORDER BY date ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(params![asset, start, end], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                ))
            })
            .map_err(query_error)?;

        let mut bars = Vec::new();
        for row in rows {
            let (date, open, high, low, close, volume) = row.map_err(query_error)?;
            bars.push(OhlcvBar {
                asset: asset.to_string(),
                date: parse_date(&date)?,
                open,
                high,
                low,
                close,
                volume,
            });
        }
        Ok(bars)
    }

    fn list_assets(&self) -> Result<Vec<String>, NavtraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT asset FROM ohlcv ORDER BY asset")
            .map_err(query_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(query_error)?;

        let mut assets = Vec::new();
        for row in rows {
            assets.push(row.map_err(query_error)?);
        }
        Ok(assets)
    }
}
