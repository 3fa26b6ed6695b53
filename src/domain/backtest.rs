//! Backtest engine and event loop.
//!
//! The run is a chain of pure stages:
//! prices -> SMA -> signals -> position changes -> equity curve -> report.

use chrono::NaiveDate;
use tracing::{debug, info};

use super::error::MacrossError;
use super::indicator::{calculate_sma, IndicatorSeries, DEFAULT_MA_PERIOD};
use super::metrics::PerformanceReport;
use super::portfolio::{EquityPoint, PortfolioState, Trade};
use super::price::{validate_series, PricePoint};
use super::signal::{generate_signals, position_changes, CrossoverRule, PositionChange, SignalPoint};

pub const DEFAULT_INITIAL_CAPITAL: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub ma_period: usize,
    pub crossover_rule: CrossoverRule,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            ma_period: DEFAULT_MA_PERIOD,
            crossover_rule: CrossoverRule::default(),
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), MacrossError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(MacrossError::config_invalid(
                "backtest",
                "initial_capital",
                "initial_capital must be positive",
            ));
        }
        if self.ma_period == 0 {
            return Err(MacrossError::config_invalid(
                "backtest",
                "ma_period",
                "ma_period must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Output of the day-by-day loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub final_state: PortfolioState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub config: BacktestConfig,
    pub indicator: IndicatorSeries,
    pub signals: Vec<SignalPoint>,
    pub changes: Vec<PositionChange>,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub final_state: PortfolioState,
    pub report: PerformanceReport,
}

impl BacktestResult {
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.equity_curve.first().map(|p| p.date)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.equity_curve.last().map(|p| p.date)
    }
}

/// Walk the points in order, buying whole lots on +2 and liquidating on -2.
/// Exactly one equity point is appended per price point, after that day's trade.
pub fn simulate(
    points: &[PricePoint],
    changes: &[PositionChange],
    initial_capital: f64,
) -> Result<Simulation, MacrossError> {
    if changes.len() != points.len() {
        return Err(MacrossError::invalid_input(
            changes.len().min(points.len()),
            format!(
                "{} position changes for {} price points",
                changes.len(),
                points.len()
            ),
        ));
    }

    let mut state = PortfolioState::new(initial_capital);
    let mut equity_curve = Vec::with_capacity(points.len());
    let mut trades = Vec::new();

    for (row, (point, change)) in points.iter().zip(changes).enumerate() {
        if change.date != point.date {
            return Err(MacrossError::invalid_input(
                row,
                format!(
                    "position change dated {} does not match price date {}",
                    change.date, point.date
                ),
            ));
        }

        let trade = if change.is_buy() {
            let trade = state.buy_max_lots(point.date, point.close);
            if trade.is_none() {
                debug!(
                    "{}: buy signal skipped, cash {:.2} below one lot at {:.2}",
                    point.date, state.cash, point.close
                );
            }
            trade
        } else if change.is_sell() {
            state.liquidate(point.date, point.close)
        } else {
            None
        };

        if let Some(trade) = trade {
            info!(
                "{}: {} {} shares at {:.2}, cash {:.2}",
                trade.date, trade.side, trade.quantity, trade.price, trade.cash_after
            );
            trades.push(trade);
        }

        equity_curve.push(state.mark(point.date, point.close));
    }

    Ok(Simulation {
        equity_curve,
        trades,
        final_state: state,
    })
}

pub fn run_backtest(
    points: &[PricePoint],
    config: &BacktestConfig,
) -> Result<BacktestResult, MacrossError> {
    config.validate()?;
    validate_series(points)?;

    let indicator = calculate_sma(points, config.ma_period);
    let signals = generate_signals(points, &indicator);
    let changes = position_changes(&signals, config.crossover_rule);
    let simulation = simulate(points, &changes, config.initial_capital)?;
    let report = PerformanceReport::compute(
        &simulation.equity_curve,
        points,
        &changes,
        simulation.trades.len(),
    );

    Ok(BacktestResult {
        config: config.clone(),
        indicator,
        signals,
        changes,
        equity_curve: simulation.equity_curve,
        trades: simulation.trades,
        final_state: simulation.final_state,
        report,
    })
}
