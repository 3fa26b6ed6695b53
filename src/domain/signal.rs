//! Close-versus-average signals and crossover detection.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::indicator::IndicatorSeries;
use super::price::PricePoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Signal {
    Bullish,
    Bearish,
    Neutral,
}

impl Signal {
    pub fn value(self) -> i8 {
        match self {
            Signal::Bullish => 1,
            Signal::Bearish => -1,
            Signal::Neutral => 0,
        }
    }

    /// Strict comparison: a close equal to the average is Neutral.
    pub fn classify(close: f64, average: Option<f64>) -> Self {
        match average {
            Some(avg) if close > avg => Signal::Bullish,
            Some(avg) if close < avg => Signal::Bearish,
            _ => Signal::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalPoint {
    pub date: NaiveDate,
    pub signal: Signal,
}

/// How consecutive signals turn into position changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossoverRule {
    /// Entering Bullish from Bearish or Neutral is +2, entering Bearish from
    /// Bullish or Neutral is -2.
    #[default]
    Transition,
    /// Raw first difference of signal values; only Bearish <-> Bullish reaches 2.
    Difference,
}

impl fmt::Display for CrossoverRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrossoverRule::Transition => write!(f, "transition"),
            CrossoverRule::Difference => write!(f, "difference"),
        }
    }
}

impl FromStr for CrossoverRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transition" => Ok(CrossoverRule::Transition),
            "difference" | "diff" => Ok(CrossoverRule::Difference),
            other => Err(format!(
                "unknown crossover rule '{other}' (expected transition or difference)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PositionChange {
    pub date: NaiveDate,
    pub delta: i8,
}

impl PositionChange {
    pub fn is_buy(&self) -> bool {
        self.delta == 2
    }

    pub fn is_sell(&self) -> bool {
        self.delta == -2
    }

    pub fn is_crossover(&self) -> bool {
        self.delta.abs() == 2
    }
}

/// One signal per point. `indicator` must be computed from `points`; a point
/// with no matching indicator value is Neutral.
pub fn generate_signals(points: &[PricePoint], indicator: &IndicatorSeries) -> Vec<SignalPoint> {
    points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let average = indicator.values.get(i).and_then(|ind| ind.value());
            SignalPoint {
                date: point.date,
                signal: Signal::classify(point.close, average),
            }
        })
        .collect()
}

/// One change per signal; the first is always 0.
pub fn position_changes(signals: &[SignalPoint], rule: CrossoverRule) -> Vec<PositionChange> {
    let mut changes = Vec::with_capacity(signals.len());
    for (i, point) in signals.iter().enumerate() {
        let delta = if i == 0 {
            0
        } else {
            transition_delta(signals[i - 1].signal, point.signal, rule)
        };
        changes.push(PositionChange {
            date: point.date,
            delta,
        });
    }
    changes
}

fn transition_delta(prev: Signal, curr: Signal, rule: CrossoverRule) -> i8 {
    let raw = curr.value() - prev.value();
    match rule {
        CrossoverRule::Difference => raw,
        CrossoverRule::Transition => match (prev, curr) {
            (Signal::Bearish | Signal::Neutral, Signal::Bullish) => 2,
            (Signal::Bullish | Signal::Neutral, Signal::Bearish) => -2,
            _ => raw,
        },
    }
}
