#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use macross::domain::error::MacrossError;
use macross::domain::price::PricePoint;
use macross::ports::provider_port::PriceProvider;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Serves a fixed series per code and records every requested window.
pub struct MockProvider {
    pub data: HashMap<String, Vec<PricePoint>>,
    pub failing_windows: Vec<NaiveDate>,
    pub requests: RefCell<Vec<(NaiveDate, NaiveDate)>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            failing_windows: Vec::new(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_points(mut self, code: &str, points: Vec<PricePoint>) -> Self {
        self.data.insert(code.to_string(), points);
        self
    }

    /// Requests whose window starts on `start` fail.
    pub fn failing_from(mut self, start: NaiveDate) -> Self {
        self.failing_windows.push(start);
        self
    }
}

impl PriceProvider for MockProvider {
    fn fetch_daily(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, MacrossError> {
        self.requests.borrow_mut().push((start_date, end_date));
        if self.failing_windows.contains(&start_date) {
            return Err(MacrossError::Provider {
                code: code.to_string(),
                reason: "request rejected".into(),
            });
        }
        Ok(self
            .data
            .get(code)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.date >= start_date && p.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One point per calendar day starting 2024-01-01.
pub fn make_points(closes: &[f64]) -> Vec<PricePoint> {
    make_points_from(date(2024, 1, 1), closes)
}

pub fn make_points_from(start: NaiveDate, closes: &[f64]) -> Vec<PricePoint> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PricePoint::new(start + Duration::days(i as i64), close))
        .collect()
}

/// `n` copies of `flat` followed by `tail`.
pub fn flat_then(flat: f64, n: usize, tail: &[f64]) -> Vec<f64> {
    let mut closes = vec![flat; n];
    closes.extend_from_slice(tail);
    closes
}

/// Writes a `trade_date,open,high,low,close,vol` file the way the daily
/// export stores it.
pub fn write_price_csv(dir: &Path, name: &str, points: &[PricePoint]) -> PathBuf {
    let mut body = String::from("ts_code,trade_date,open,high,low,close,vol\n");
    for p in points {
        body.push_str(&format!(
            "600519.SH,{},{},{},{},{},1000\n",
            p.date.format("%Y%m%d"),
            p.close,
            p.close,
            p.close,
            p.close
        ));
    }
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}
