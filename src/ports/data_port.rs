//! Price series loading port trait.

use crate::domain::error::MacrossError;
use crate::domain::price::PricePoint;

/// Points sorted ascending by date, plus the number of input rows dropped
/// because their date could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSeries {
    pub points: Vec<PricePoint>,
    pub skipped_rows: usize,
}

pub trait PriceSeriesLoader {
    /// `source` is a file path or an equivalent identifier (e.g. a ticker in a store).
    fn load(&self, source: &str) -> Result<LoadedSeries, MacrossError>;
}
