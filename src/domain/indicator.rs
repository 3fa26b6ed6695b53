//! Trend indicator series.
//!
//! SMA(n)[i] = (close[i-n+1] + ... + close[i]) / n
//! Warmup: first (n-1) points are invalid.
//!
//! Each window is summed afresh; a point's average depends only on the n
//! closes ending at it.

use chrono::NaiveDate;

use super::price::PricePoint;

pub const DEFAULT_MA_PERIOD: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: f64,
}

impl IndicatorPoint {
    pub fn value(&self) -> Option<f64> {
        self.valid.then_some(self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub period: usize,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|p| p.valid).count()
    }
}

pub fn calculate_sma(points: &[PricePoint], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            period,
            values: Vec::new(),
        };
    }

    let values = points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            if i + 1 < period {
                return IndicatorPoint {
                    date: point.date,
                    valid: false,
                    value: 0.0,
                };
            }
            let window = &points[i + 1 - period..=i];
            let sum: f64 = window.iter().map(|p| p.close).sum();
            IndicatorPoint {
                date: point.date,
                valid: true,
                value: sum / period as f64,
            }
        })
        .collect();

    IndicatorSeries { period, values }
}
