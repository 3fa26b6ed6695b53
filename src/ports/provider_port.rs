//! Upstream data provider and rate limiting port traits.

use crate::domain::error::MacrossError;
use crate::domain::price::PricePoint;
use chrono::NaiveDate;

/// Daily rows for one code over an inclusive date range.
pub trait PriceProvider {
    fn fetch_daily(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, MacrossError>;
}

/// Blocks until the caller may issue one more provider request.
pub trait RateLimiter {
    fn acquire(&self);
}

impl<T: PriceProvider + ?Sized> PriceProvider for &T {
    fn fetch_daily(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, MacrossError> {
        (**self).fetch_daily(code, start_date, end_date)
    }
}

impl<T: RateLimiter + ?Sized> RateLimiter for &T {
    fn acquire(&self) {
        (**self).acquire()
    }
}
