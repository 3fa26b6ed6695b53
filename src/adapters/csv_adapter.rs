//! CSV file data adapter.
//!
//! Files carry a header row. The date column is `trade_date` or `date`
//! (`YYYYMMDD`, `YYYY-MM-DD`, or a spreadsheet-style timestamp); `close` is
//! required; `open`, `high`, `low` and `vol`/`volume` are optional.

use crate::domain::adjust::AdjFactor;
use crate::domain::error::MacrossError;
use crate::domain::price::PricePoint;
use crate::ports::data_port::{LoadedSeries, PriceSeriesLoader};
use crate::ports::provider_port::PriceProvider;
use chrono::NaiveDate;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DATE_COLUMNS: [&str; 2] = ["trade_date", "date"];
const VOLUME_COLUMNS: [&str; 2] = ["vol", "volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// `600519.SH` is stored as `600519_SH.csv`.
    fn code_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code.replace('.', "_")))
    }

    fn open(&self, path: &Path) -> Result<File, MacrossError> {
        File::open(path).map_err(|e| MacrossError::Load {
            source_id: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn load_adj_factors(&self, source: &str) -> Result<Vec<AdjFactor>, MacrossError> {
        let path = self.base_path.join(source);
        let file = self.open(&path)?;
        parse_adj_factor_csv(file, &path.display().to_string())
    }
}

impl PriceSeriesLoader for CsvAdapter {
    fn load(&self, source: &str) -> Result<LoadedSeries, MacrossError> {
        let path = self.base_path.join(source);
        info!("Loading prices from {}", path.display());
        let file = self.open(&path)?;
        parse_price_csv(file, &path.display().to_string())
    }
}

impl PriceProvider for CsvAdapter {
    fn fetch_daily(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, MacrossError> {
        let path = self.code_path(code);
        let file = File::open(&path).map_err(|e| MacrossError::Provider {
            code: code.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let series = parse_price_csv(file, &path.display().to_string())?;
        let points: Vec<PricePoint> = series
            .points
            .into_iter()
            .filter(|p| p.date >= start_date && p.date <= end_date)
            .collect();
        debug!(
            "{}: {} rows between {} and {}",
            code,
            points.len(),
            start_date,
            end_date
        );
        Ok(points)
    }
}

pub fn parse_trade_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let raw = raw.strip_suffix(".0").unwrap_or(raw);
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date())
        })
        .ok()
}

struct Columns {
    date: usize,
    close: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    volume: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord, source_id: &str) -> Result<Self, MacrossError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        let missing = |column: &str| MacrossError::Load {
            source_id: source_id.to_string(),
            reason: format!("missing {column} column"),
        };
        Ok(Columns {
            date: find(&DATE_COLUMNS).ok_or_else(|| missing("trade_date"))?,
            close: find(&["close"]).ok_or_else(|| missing("close"))?,
            open: find(&["open"]),
            high: find(&["high"]),
            low: find(&["low"]),
            volume: find(&VOLUME_COLUMNS),
        })
    }
}

fn field<'r>(record: &'r csv::StringRecord, index: Option<usize>) -> Option<&'r str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_price(
    record: &csv::StringRecord,
    index: Option<usize>,
    name: &str,
    row: usize,
) -> Result<Option<f64>, MacrossError> {
    match field(record, index) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|e| MacrossError::invalid_input(row, format!("invalid {name} '{raw}': {e}"))),
    }
}

/// Rows with unparseable dates are dropped and counted; a missing or
/// malformed close is an error naming the data row (zero-based, header
/// excluded). The result is sorted ascending by date.
pub fn parse_price_csv<R: Read>(reader: R, source_id: &str) -> Result<LoadedSeries, MacrossError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let load_err = |e: csv::Error| MacrossError::Load {
        source_id: source_id.to_string(),
        reason: format!("CSV parse error: {e}"),
    };

    let headers = rdr.headers().map_err(load_err)?.clone();
    let columns = Columns::locate(&headers, source_id)?;

    let mut points = Vec::new();
    let mut skipped_rows = 0usize;

    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(load_err)?;

        let Some(date) = field(&record, Some(columns.date)).and_then(parse_trade_date) else {
            skipped_rows += 1;
            continue;
        };

        let close = parse_price(&record, Some(columns.close), "close", row)?
            .ok_or_else(|| MacrossError::invalid_input(row, format!("missing close on {date}")))?;

        let volume = parse_price(&record, columns.volume, "volume", row)?.map(|v| v.round() as i64);

        points.push(PricePoint {
            date,
            open: parse_price(&record, columns.open, "open", row)?,
            high: parse_price(&record, columns.high, "high", row)?,
            low: parse_price(&record, columns.low, "low", row)?,
            close,
            volume,
        });
    }

    if skipped_rows > 0 {
        warn!(
            "{}: skipped {} rows with unparseable dates",
            source_id, skipped_rows
        );
    }

    points.sort_by_key(|p| p.date);

    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        info!(
            "Loaded {} rows from {} ({} to {})",
            points.len(),
            source_id,
            first.date,
            last.date
        );
    }

    Ok(LoadedSeries {
        points,
        skipped_rows,
    })
}

/// `trade_date,adj_factor` rows; unparseable dates are skipped.
pub fn parse_adj_factor_csv<R: Read>(
    reader: R,
    source_id: &str,
) -> Result<Vec<AdjFactor>, MacrossError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let load_err = |e: csv::Error| MacrossError::Load {
        source_id: source_id.to_string(),
        reason: format!("CSV parse error: {e}"),
    };

    let headers = rdr.headers().map_err(load_err)?.clone();
    let position = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
    };
    let (Some(date_idx), Some(factor_idx)) = (position(&DATE_COLUMNS), position(&["adj_factor"]))
    else {
        return Err(MacrossError::Load {
            source_id: source_id.to_string(),
            reason: "expected trade_date and adj_factor columns".into(),
        });
    };

    let mut factors = Vec::new();
    let mut skipped = 0usize;
    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(load_err)?;
        let Some(date) = field(&record, Some(date_idx)).and_then(parse_trade_date) else {
            skipped += 1;
            continue;
        };
        let factor = parse_price(&record, Some(factor_idx), "adj_factor", row)?
            .ok_or_else(|| MacrossError::invalid_input(row, format!("missing adj_factor on {date}")))?;
        factors.push(AdjFactor { date, factor });
    }

    if skipped > 0 {
        warn!("{}: skipped {} rows with unparseable dates", source_id, skipped);
    }
    factors.sort_by_key(|f| f.date);
    Ok(factors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const TUSHARE_CSV: &str = "ts_code,trade_date,open,high,low,close,vol,amount\n\
        600519.SH,20150107,190.1,195.0,188.5,192.3,30512.0,5870000\n\
        600519.SH,20150105,185.0,190.0,184.0,189.9,41000.0,7800000\n\
        600519.SH,20150106,189.9,191.0,186.2,187.0,35800.7,6690000\n";

    fn setup_dir() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        fs::write(path.join("600519_SH.csv"), TUSHARE_CSV).unwrap();
        fs::write(
            path.join("factors.csv"),
            "trade_date,adj_factor\n20150105,1.0\n20150106,1.0\n20150107,2.0\n",
        )
        .unwrap();
        (dir, path)
    }

    #[test]
    fn parses_tushare_export_and_sorts() {
        let series = parse_price_csv(TUSHARE_CSV.as_bytes(), "mem").unwrap();
        assert_eq!(series.skipped_rows, 0);
        assert_eq!(series.points.len(), 3);
        assert_eq!(series.points[0].date, date(2015, 1, 5));
        assert_eq!(series.points[2].date, date(2015, 1, 7));
        assert_eq!(series.points[0].close, 189.9);
        assert_eq!(series.points[0].open, Some(185.0));
        assert_eq!(series.points[1].volume, Some(35_801));
    }

    #[test]
    fn accepts_iso_dates_and_close_only() {
        let csv = "date,close\n2024-01-02,10.5\n2024-01-03 00:00:00,11.0\n";
        let series = parse_price_csv(csv.as_bytes(), "mem").unwrap();
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[0].open, None);
        assert_eq!(series.points[0].volume, None);
        assert_eq!(series.points[1].date, date(2024, 1, 3));
    }

    #[test]
    fn skips_unparseable_dates_and_counts_them() {
        let csv = "trade_date,close\n20240102,10\nnot-a-date,11\n,12\n20241399,13\n20240103,14\n";
        let series = parse_price_csv(csv.as_bytes(), "mem").unwrap();
        assert_eq!(series.skipped_rows, 3);
        let closes: Vec<f64> = series.points.iter().map(|p| p.close).collect();
        assert_eq!(closes, vec![10.0, 14.0]);
    }

    #[test]
    fn missing_close_is_invalid_input_with_row() {
        let csv = "trade_date,close\n20240102,10\n20240103,\n";
        match parse_price_csv(csv.as_bytes(), "mem") {
            Err(MacrossError::InvalidInput { row, reason }) => {
                assert_eq!(row, 1);
                assert!(reason.contains("missing close"));
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn malformed_close_is_invalid_input() {
        let csv = "trade_date,close\n20240102,abc\n";
        assert!(matches!(
            parse_price_csv(csv.as_bytes(), "mem"),
            Err(MacrossError::InvalidInput { row: 0, .. })
        ));
    }

    #[test]
    fn missing_close_column_is_load_error() {
        let csv = "trade_date,open\n20240102,10\n";
        match parse_price_csv(csv.as_bytes(), "prices.csv") {
            Err(MacrossError::Load { source_id, reason }) => {
                assert_eq!(source_id, "prices.csv");
                assert!(reason.contains("close"));
            }
            other => panic!("expected Load, got {other:?}"),
        }
    }

    #[test]
    fn loader_reads_file_relative_to_base() {
        let (_dir, path) = setup_dir();
        let adapter = CsvAdapter::new(path);
        let series = adapter.load("600519_SH.csv").unwrap();
        assert_eq!(series.points.len(), 3);
    }

    #[test]
    fn loader_missing_file_is_load_error() {
        let (_dir, path) = setup_dir();
        let adapter = CsvAdapter::new(path);
        assert!(matches!(
            adapter.load("absent.csv"),
            Err(MacrossError::Load { .. })
        ));
    }

    #[test]
    fn provider_filters_by_date() {
        let (_dir, path) = setup_dir();
        let adapter = CsvAdapter::new(path);
        let points = adapter
            .fetch_daily("600519.SH", date(2015, 1, 6), date(2015, 1, 6))
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].close, 187.0);
    }

    #[test]
    fn provider_unknown_code_is_provider_error() {
        let (_dir, path) = setup_dir();
        let adapter = CsvAdapter::new(path);
        assert!(matches!(
            adapter.fetch_daily("000001.SZ", date(2015, 1, 1), date(2015, 2, 1)),
            Err(MacrossError::Provider { .. })
        ));
    }

    #[test]
    fn loads_adjustment_factors() {
        let (_dir, path) = setup_dir();
        let adapter = CsvAdapter::new(path);
        let factors = adapter.load_adj_factors("factors.csv").unwrap();
        assert_eq!(factors.len(), 3);
        assert_eq!(factors[2].date, date(2015, 1, 7));
        assert_eq!(factors[2].factor, 2.0);
    }

    #[test]
    fn parse_trade_date_formats() {
        assert_eq!(parse_trade_date("20150101"), Some(date(2015, 1, 1)));
        assert_eq!(parse_trade_date("20150101.0"), Some(date(2015, 1, 1)));
        assert_eq!(parse_trade_date(" 2015-01-01 "), Some(date(2015, 1, 1)));
        assert_eq!(parse_trade_date("2015/01/01"), None);
        assert_eq!(parse_trade_date(""), None);
    }
}
