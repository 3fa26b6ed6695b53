//! Performance metrics and statistics.

use chrono::NaiveDate;
use serde::Serialize;

use super::portfolio::EquityPoint;
use super::price::PricePoint;
use super::signal::PositionChange;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskMetrics {
    pub max_drawdown: f64,
    pub max_drawdown_duration_days: i64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub initial_assets: f64,
    pub final_assets: f64,
    pub total_return_pct: f64,
    pub years_held: f64,
    pub annual_return_pct: f64,
    pub buy_hold_return_pct: f64,
    pub trade_signals: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub executed_trades: usize,
    pub risk: RiskMetrics,
}

impl PerformanceReport {
    /// Degenerate inputs (empty curve, single day, zero denominators) yield 0
    /// for the affected figures instead of an error.
    pub fn compute(
        equity_curve: &[EquityPoint],
        points: &[PricePoint],
        changes: &[PositionChange],
        executed_trades: usize,
    ) -> Self {
        let initial_assets = equity_curve.first().map(|p| p.total_assets).unwrap_or(0.0);
        let final_assets = equity_curve.last().map(|p| p.total_assets).unwrap_or(0.0);

        let total_return_pct = if initial_assets > 0.0 {
            (final_assets - initial_assets) / initial_assets * 100.0
        } else {
            0.0
        };

        let start_date = equity_curve.first().map(|p| p.date);
        let end_date = equity_curve.last().map(|p| p.date);
        let years_held = match (start_date, end_date) {
            (Some(start), Some(end)) => (end - start).num_days() as f64 / DAYS_PER_YEAR,
            _ => 0.0,
        };

        let annual_return_pct = if years_held > 0.0 && total_return_pct.is_finite() {
            ((1.0 + total_return_pct / 100.0).powf(1.0 / years_held) - 1.0) * 100.0
        } else {
            0.0
        };

        let buy_hold_return_pct = match (points.first(), points.last()) {
            (Some(first), Some(last)) if first.close > 0.0 => {
                (last.close - first.close) / first.close * 100.0
            }
            _ => 0.0,
        };

        let buy_signals = changes.iter().filter(|c| c.is_buy()).count();
        let sell_signals = changes.iter().filter(|c| c.is_sell()).count();

        PerformanceReport {
            start_date,
            end_date,
            initial_assets,
            final_assets,
            total_return_pct,
            years_held,
            annual_return_pct,
            buy_hold_return_pct,
            trade_signals: buy_signals + sell_signals,
            buy_signals,
            sell_signals,
            executed_trades,
            risk: RiskMetrics::compute(equity_curve),
        }
    }
}

impl RiskMetrics {
    pub fn compute(equity_curve: &[EquityPoint]) -> Self {
        let (max_drawdown, max_drawdown_duration_days) = compute_drawdown(equity_curve);
        let returns = daily_returns(equity_curve);
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(&returns);
        RiskMetrics {
            max_drawdown,
            max_drawdown_duration_days,
            sharpe_ratio,
            sortino_ratio,
        }
    }
}

/// Largest peak-to-trough decline as a fraction of the peak, and the longest
/// calendar span from a peak to the first day equity regains it. A drawdown
/// still open at the end of the curve is measured to the last date.
fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, i64) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.total_assets;
    let mut peak_date = first.date;
    let mut underwater = false;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0i64;

    for point in equity_curve {
        if point.total_assets >= peak {
            if underwater {
                max_duration = max_duration.max((point.date - peak_date).num_days());
                underwater = false;
            }
            peak = point.total_assets;
            peak_date = point.date;
        } else if peak > 0.0 {
            underwater = true;
            let dd = 1.0 - point.total_assets / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    if underwater {
        if let Some(last) = equity_curve.last() {
            max_duration = max_duration.max((last.date - peak_date).num_days());
        }
    }

    (max_dd, max_duration)
}

fn daily_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].total_assets;
            if prev > 0.0 {
                (w[1].total_assets - prev) / prev
            } else {
                0.0
            }
        })
        .collect()
}

fn sample_stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Annualised mean return over the annualised deviation of all returns
/// (Sharpe) and of losing returns only (Sortino).
fn compute_risk_adjusted(returns: &[f64]) -> (f64, f64) {
    if returns.len() < 2 {
        return (0.0, 0.0);
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let annual_mean = mean * TRADING_DAYS_PER_YEAR;
    let annualise = TRADING_DAYS_PER_YEAR.sqrt();

    let sharpe = match sample_stddev(returns) {
        Some(sd) if sd > 0.0 => annual_mean / (sd * annualise),
        _ => 0.0,
    };

    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    let sortino = match sample_stddev(&downside) {
        Some(sd) if sd > 0.0 => annual_mean / (sd * annualise),
        _ => 0.0,
    };

    (sharpe, sortino)
}
