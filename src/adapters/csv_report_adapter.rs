//! CSV report adapter.
//!
//! Writes `equity_curve.csv`, `trades.csv` and `summary.csv` into the
//! output directory, creating it when missing.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::MacrossError;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

pub const EQUITY_CURVE_FILE: &str = "equity_curve.csv";
pub const TRADES_FILE: &str = "trades.csv";
pub const SUMMARY_FILE: &str = "summary.csv";

pub struct CsvReportAdapter;

/// One row per trading day, joining the price, indicator, signal and
/// portfolio columns.
#[derive(Serialize)]
struct EquityRow {
    date: NaiveDate,
    close: f64,
    ma: Option<f64>,
    signal: i8,
    position_change: i8,
    cash: f64,
    shares: u64,
    total_assets: f64,
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    metric: &'a str,
    value: String,
}

fn csv_err(path: &Path, e: csv::Error) -> MacrossError {
    MacrossError::Write {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_default()
}

fn equity_rows(result: &BacktestResult) -> Vec<EquityRow> {
    result
        .equity_curve
        .iter()
        .enumerate()
        .map(|(i, p)| EquityRow {
            date: p.date,
            close: p.close,
            ma: result.indicator.values.get(i).and_then(|v| v.value()),
            signal: result.signals.get(i).map(|s| s.signal.value()).unwrap_or(0),
            position_change: result.changes.get(i).map(|c| c.delta).unwrap_or(0),
            cash: p.cash,
            shares: p.shares,
            total_assets: p.total_assets,
        })
        .collect()
}

fn summary_rows(result: &BacktestResult) -> Vec<SummaryRow<'static>> {
    let r = &result.report;
    let config = &result.config;
    [
        ("start_date", fmt_date(r.start_date)),
        ("end_date", fmt_date(r.end_date)),
        ("ma_period", config.ma_period.to_string()),
        ("crossover_rule", config.crossover_rule.to_string()),
        ("initial_assets", format!("{:.2}", r.initial_assets)),
        ("final_assets", format!("{:.2}", r.final_assets)),
        ("total_return_pct", format!("{:.4}", r.total_return_pct)),
        ("years_held", format!("{:.4}", r.years_held)),
        ("annual_return_pct", format!("{:.4}", r.annual_return_pct)),
        ("buy_hold_return_pct", format!("{:.4}", r.buy_hold_return_pct)),
        ("trade_signals", r.trade_signals.to_string()),
        ("buy_signals", r.buy_signals.to_string()),
        ("sell_signals", r.sell_signals.to_string()),
        ("executed_trades", r.executed_trades.to_string()),
        ("max_drawdown", format!("{:.6}", r.risk.max_drawdown)),
        ("max_drawdown_duration_days", r.risk.max_drawdown_duration_days.to_string()),
        ("sharpe_ratio", format!("{:.6}", r.risk.sharpe_ratio)),
        ("sortino_ratio", format!("{:.6}", r.risk.sortino_ratio)),
    ]
    .into_iter()
    .map(|(metric, value)| SummaryRow { metric, value })
    .collect()
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), MacrossError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|e| csv_err(path, e.into()))?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), MacrossError> {
        let dir = Path::new(output_path);
        fs::create_dir_all(dir)?;

        write_rows(&dir.join(EQUITY_CURVE_FILE), &equity_rows(result))?;
        write_rows(&dir.join(TRADES_FILE), &result.trades)?;
        write_rows(&dir.join(SUMMARY_FILE), &summary_rows(result))?;

        info!(
            "Wrote report ({} days, {} trades) to {}",
            result.equity_curve.len(),
            result.trades.len(),
            dir.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::{run_backtest, BacktestConfig};
    use crate::domain::price::PricePoint;
    use chrono::Duration;
    use tempfile::TempDir;

    fn sample_result() -> BacktestResult {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let closes = [10.0, 10.0, 10.0, 12.0, 12.0, 8.0, 8.0];
        let points: Vec<PricePoint> = closes
            .iter()
            .enumerate()
            .map(|(i, c)| PricePoint::new(start + Duration::days(i as i64), *c))
            .collect();
        let config = BacktestConfig {
            initial_capital: 10_000.0,
            ma_period: 3,
            ..BacktestConfig::default()
        };
        run_backtest(&points, &config).unwrap()
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn writes_three_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested/report");
        let result = sample_result();

        CsvReportAdapter
            .write(&result, out.to_str().unwrap())
            .unwrap();

        let equity = read(&out.join(EQUITY_CURVE_FILE));
        let mut lines = equity.lines();
        assert_eq!(
            lines.next().unwrap(),
            "date,close,ma,signal,position_change,cash,shares,total_assets"
        );
        assert_eq!(lines.count(), result.equity_curve.len());

        let trades = read(&out.join(TRADES_FILE));
        assert!(trades.starts_with("date,side,quantity,price,cash_after"));
        assert_eq!(trades.lines().count(), result.trades.len() + 1);
        assert!(trades.contains(",buy,"));

        let summary = read(&out.join(SUMMARY_FILE));
        assert!(summary.starts_with("metric,value"));
        assert!(summary.contains("initial_assets,10000.00"));
        assert!(summary.contains("crossover_rule,transition"));
    }

    #[test]
    fn warm_up_rows_leave_ma_blank() {
        let dir = TempDir::new().unwrap();
        let result = sample_result();
        CsvReportAdapter
            .write(&result, dir.path().to_str().unwrap())
            .unwrap();

        let equity = read(&dir.path().join(EQUITY_CURVE_FILE));
        let first_row = equity.lines().nth(1).unwrap();
        assert!(first_row.starts_with("2024-01-01,10.0,,0,0,"));
    }

    #[test]
    fn summary_lists_every_metric_in_order() {
        let rows = summary_rows(&sample_result());
        let metrics: Vec<&str> = rows.iter().map(|r| r.metric).collect();
        assert_eq!(metrics.first(), Some(&"start_date"));
        assert_eq!(metrics.last(), Some(&"sortino_ratio"));
        assert_eq!(metrics.len(), 18);
        assert_eq!(rows[2].value, "3");
    }

    #[test]
    fn unwritable_file_is_write_error() {
        let dir = TempDir::new().unwrap();
        // a directory where the report file should go blocks the write
        fs::create_dir(dir.path().join(TRADES_FILE)).unwrap();

        let err = CsvReportAdapter
            .write(&sample_result(), dir.path().to_str().unwrap())
            .unwrap_err();
        match err {
            MacrossError::Write { path, .. } => assert!(path.ends_with(TRADES_FILE)),
            other => panic!("expected Write, got: {other}"),
        }
    }
}
