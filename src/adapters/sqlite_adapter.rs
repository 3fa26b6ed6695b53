//! SQLite price store and equity-curve archive.

use crate::domain::error::MacrossError;
use crate::domain::portfolio::EquityPoint;
use crate::domain::price::PricePoint;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{LoadedSeries, PriceSeriesLoader};
use crate::ports::provider_port::PriceProvider;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> MacrossError {
    MacrossError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> MacrossError {
    MacrossError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_date_column(row: &Row<'_>, index: usize) -> rusqlite::Result<NaiveDate> {
    let date_str: String = row.get(index)?;
    NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn price_from_row(row: &Row<'_>) -> rusqlite::Result<PricePoint> {
    Ok(PricePoint {
        date: parse_date_column(row, 0)?,
        open: row.get(1)?,
        high: row.get(2)?,
        low: row.get(3)?,
        close: row.get(4)?,
        volume: row.get(5)?,
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, MacrossError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| MacrossError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;
        let pool_size = u32::try_from(config.get_int("sqlite", "pool_size", 4))
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                MacrossError::config_invalid(
                    "sqlite",
                    "pool_size",
                    format!("pool_size must be between 1 and {}", u32::MAX),
                )
            })?;
        Self::open(&db_path, pool_size)
    }

    pub fn open(db_path: &str, pool_size: u32) -> Result<Self, MacrossError> {
        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;
        debug!("Opened SQLite database {} (pool size {})", db_path, pool_size);
        Ok(Self { pool })
    }

    /// Single-connection pool so every checkout sees the same database.
    pub fn in_memory() -> Result<Self, MacrossError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, MacrossError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), MacrossError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS price_daily (
                    code TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL,
                    high REAL,
                    low REAL,
                    close REAL NOT NULL,
                    volume INTEGER,
                    PRIMARY KEY (code, date)
                );
                CREATE TABLE IF NOT EXISTS equity_curve (
                    run_id TEXT NOT NULL,
                    date TEXT NOT NULL,
                    cash REAL NOT NULL,
                    shares INTEGER NOT NULL,
                    close REAL NOT NULL,
                    total_assets REAL NOT NULL,
                    PRIMARY KEY (run_id, date)
                );",
            )
            .map_err(query_err)
    }

    /// Upserts rows in one transaction; re-importing a date replaces it.
    pub fn insert_points(&self, code: &str, points: &[PricePoint]) -> Result<usize, MacrossError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO price_daily (code, date, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(query_err)?;
            for p in points {
                stmt.execute(params![
                    code,
                    p.date.format(DATE_FORMAT).to_string(),
                    p.open,
                    p.high,
                    p.low,
                    p.close,
                    p.volume
                ])
                .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;
        info!("Stored {} rows for {}", points.len(), code);
        Ok(points.len())
    }

    pub fn fetch_range(
        &self,
        code: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, MacrossError> {
        let conn = self.conn()?;
        let start_str = start_date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_else(|| "0000-01-01".into());
        let end_str = end_date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_else(|| "9999-12-31".into());

        let mut stmt = conn
            .prepare(
                "SELECT date, open, high, low, close, volume
                 FROM price_daily
                 WHERE code = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![code, start_str, end_str], price_from_row)
            .map_err(query_err)?;

        let mut points = Vec::new();
        for row in rows {
            points.push(row.map_err(query_err)?);
        }
        Ok(points)
    }

    pub fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, MacrossError> {
        let conn = self.conn()?;
        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM price_daily WHERE code = ?1",
                params![code],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let parse = |s: &str| {
                    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e: chrono::ParseError| {
                        MacrossError::Database {
                            reason: e.to_string(),
                        }
                    })
                };
                Ok(Some((parse(&min_str)?, parse(&max_str)?, count as usize)))
            }
            _ => Ok(None),
        }
    }

    pub fn list_codes(&self) -> Result<Vec<String>, MacrossError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT code FROM price_daily ORDER BY code")
            .map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
        let mut codes: Vec<String> = Vec::new();
        for row in rows {
            codes.push(row.map_err(query_err)?);
        }
        Ok(codes)
    }

    /// Replaces any rows previously saved under `run_id` with the same dates.
    pub fn save_equity_curve(
        &self,
        run_id: &str,
        curve: &[EquityPoint],
    ) -> Result<(), MacrossError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO equity_curve (run_id, date, cash, shares, close, total_assets)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(query_err)?;
            for p in curve {
                stmt.execute(params![
                    run_id,
                    p.date.format(DATE_FORMAT).to_string(),
                    p.cash,
                    p.shares as i64,
                    p.close,
                    p.total_assets
                ])
                .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;
        info!("Saved {} equity points as run '{}'", curve.len(), run_id);
        Ok(())
    }

    pub fn load_equity_curve(&self, run_id: &str) -> Result<Vec<EquityPoint>, MacrossError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, cash, shares, close, total_assets
                 FROM equity_curve WHERE run_id = ?1 ORDER BY date ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                let shares: i64 = row.get(2)?;
                Ok(EquityPoint {
                    date: parse_date_column(row, 0)?,
                    cash: row.get(1)?,
                    shares: shares.max(0) as u64,
                    close: row.get(3)?,
                    total_assets: row.get(4)?,
                })
            })
            .map_err(query_err)?;
        let mut curve = Vec::new();
        for row in rows {
            curve.push(row.map_err(query_err)?);
        }
        Ok(curve)
    }
}

impl PriceSeriesLoader for SqliteAdapter {
    /// `source` is a security code; every stored row is returned.
    fn load(&self, source: &str) -> Result<LoadedSeries, MacrossError> {
        let points = self.fetch_range(source, None, None)?;
        if points.is_empty() {
            return Err(MacrossError::NoData {
                code: source.to_string(),
            });
        }
        Ok(LoadedSeries {
            points,
            skipped_rows: 0,
        })
    }
}

impl PriceProvider for SqliteAdapter {
    fn fetch_daily(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, MacrossError> {
        self.fetch_range(code, Some(start_date), Some(end_date))
    }
}
