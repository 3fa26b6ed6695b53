//! Daily price points and series validation.

use chrono::NaiveDate;
use serde::Serialize;

use super::error::MacrossError;

/// One trading day. Only `date` and `close` are required.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<i64>,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        PricePoint {
            date,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }

    /// Same point with every present price multiplied by `ratio`, rounded to cents.
    pub fn scaled(&self, ratio: f64) -> Self {
        let scale = |p: f64| round_cents(p * ratio);
        PricePoint {
            date: self.date,
            open: self.open.map(scale),
            high: self.high.map(scale),
            low: self.low.map(scale),
            close: scale(self.close),
            volume: self.volume,
        }
    }
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rejects series the simulator cannot consume: a close that is missing
/// (non-finite) or non-positive, dates out of ascending order, and repeated
/// dates. The error names the zero-based row that broke the rule.
pub fn validate_series(points: &[PricePoint]) -> Result<(), MacrossError> {
    for (row, point) in points.iter().enumerate() {
        if !point.close.is_finite() {
            return Err(MacrossError::invalid_input(
                row,
                format!("missing close on {}", point.date),
            ));
        }
        if point.close <= 0.0 {
            return Err(MacrossError::invalid_input(
                row,
                format!("non-positive close {} on {}", point.close, point.date),
            ));
        }
        if row > 0 {
            let prev = points[row - 1].date;
            if point.date == prev {
                return Err(MacrossError::invalid_input(
                    row,
                    format!("duplicate date {}", point.date),
                ));
            }
            if point.date < prev {
                return Err(MacrossError::invalid_input(
                    row,
                    format!("date {} is before previous date {}", point.date, prev),
                ));
            }
        }
    }
    Ok(())
}
