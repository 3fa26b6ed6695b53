//! Forward (qfq) price adjustment.
//!
//! adjusted = raw * factor(date) / factor(base_date), rounded to cents.
//! Anchoring on the base date keeps its prices unchanged and rescales history.

use chrono::NaiveDate;
use std::collections::HashMap;

use super::error::MacrossError;
use super::price::PricePoint;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjFactor {
    pub date: NaiveDate,
    pub factor: f64,
}

pub fn forward_adjust(
    points: &[PricePoint],
    factors: &[AdjFactor],
    base_date: NaiveDate,
) -> Result<Vec<PricePoint>, MacrossError> {
    let by_date: HashMap<NaiveDate, f64> = factors.iter().map(|f| (f.date, f.factor)).collect();

    let base = match by_date.get(&base_date) {
        Some(&b) if b.is_finite() && b > 0.0 => b,
        _ => {
            return Err(MacrossError::InvalidInput {
                row: 0,
                reason: format!("no usable adjustment factor on base date {base_date}"),
            });
        }
    };

    points
        .iter()
        .enumerate()
        .map(|(row, point)| match by_date.get(&point.date) {
            Some(&factor) if factor.is_finite() && factor > 0.0 => Ok(point.scaled(factor / base)),
            _ => Err(MacrossError::invalid_input(
                row,
                format!("no adjustment factor for {}", point.date),
            )),
        })
        .collect()
}
