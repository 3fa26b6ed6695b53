//! Configuration access port trait.

use crate::domain::error::MacrossError;
use chrono::NaiveDate;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;

    /// Accepts `YYYY-MM-DD` and the compact `YYYYMMDD` form.
    fn get_date(&self, section: &str, key: &str) -> Result<Option<NaiveDate>, MacrossError> {
        match self.get_string(section, key) {
            None => Ok(None),
            Some(raw) => parse_config_date(&raw).map(Some).ok_or_else(|| {
                MacrossError::config_invalid(
                    section,
                    key,
                    format!("invalid date '{raw}' (expected YYYY-MM-DD or YYYYMMDD)"),
                )
            }),
        }
    }
}

pub fn parse_config_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .ok()
}
