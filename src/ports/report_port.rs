//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::MacrossError;

/// Port for persisting backtest output.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), MacrossError>;
}
