//! Splitting a request window into provider-sized chunks.

use chrono::{Duration, NaiveDate};

use super::error::MacrossError;

pub const DEFAULT_CHUNK_DAYS: i64 = 2000;

/// Inclusive, non-overlapping `(start, end)` chunks of at most `max_days`
/// calendar days that together cover `[start, end]`. Empty when `start > end`.
pub fn split_date_range(
    start: NaiveDate,
    end: NaiveDate,
    max_days: i64,
) -> Result<Vec<(NaiveDate, NaiveDate)>, MacrossError> {
    if max_days < 1 {
        return Err(MacrossError::config_invalid(
            "provider",
            "chunk_days",
            "chunk_days must be at least 1",
        ));
    }

    let mut chunks = Vec::new();
    if start > end {
        return Ok(chunks);
    }
    // a chunk never needs to be longer than the whole range
    let step = max_days.min((end - start).num_days() + 1);
    let mut current = start;
    while current <= end {
        let chunk_end = current
            .checked_add_signed(Duration::days(step - 1))
            .map_or(end, |d| d.min(end));
        chunks.push((current, chunk_end));
        match chunk_end.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn single_chunk_when_range_fits() {
        let chunks = split_date_range(date(2024, 1, 1), date(2024, 1, 10), 10).unwrap();
        assert_eq!(chunks, vec![(date(2024, 1, 1), date(2024, 1, 10))]);
    }

    #[test]
    fn splits_into_contiguous_chunks() {
        let chunks = split_date_range(date(2024, 1, 1), date(2024, 1, 10), 4).unwrap();
        assert_eq!(
            chunks,
            vec![
                (date(2024, 1, 1), date(2024, 1, 4)),
                (date(2024, 1, 5), date(2024, 1, 8)),
                (date(2024, 1, 9), date(2024, 1, 10)),
            ]
        );
    }

    #[test]
    fn single_day_range() {
        let chunks = split_date_range(date(2024, 1, 1), date(2024, 1, 1), 2000).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn reversed_range_is_empty() {
        let chunks = split_date_range(date(2024, 2, 1), date(2024, 1, 1), 5).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn zero_chunk_size_rejected() {
        assert!(matches!(
            split_date_range(date(2024, 1, 1), date(2024, 1, 2), 0),
            Err(MacrossError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn oversized_chunk_size_yields_one_chunk() {
        let start = date(2015, 1, 1);
        let end = date(2024, 1, 1);
        assert_eq!(
            split_date_range(start, end, 100_000_000).unwrap(),
            vec![(start, end)]
        );
        assert_eq!(
            split_date_range(start, end, i64::MAX).unwrap(),
            vec![(start, end)]
        );
    }

    #[test]
    fn range_ending_at_last_representable_date_terminates() {
        let end = NaiveDate::MAX;
        let start = end - Duration::days(9);
        let chunks = split_date_range(start, end, 4).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.first().unwrap().0, start);
        assert_eq!(chunks.last().unwrap().1, end);

        let whole = split_date_range(NaiveDate::MIN, end, i64::MAX).unwrap();
        assert_eq!(whole, vec![(NaiveDate::MIN, end)]);
    }

    #[test]
    fn default_chunks_cover_decade() {
        let start = date(2016, 1, 1);
        let end = date(2025, 7, 29);
        let chunks = split_date_range(start, end, DEFAULT_CHUNK_DAYS).unwrap();
        assert_eq!(chunks.first().unwrap().0, start);
        assert_eq!(chunks.last().unwrap().1, end);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].1 + Duration::days(1), pair[1].0);
        }
        for (s, e) in &chunks {
            assert!((*e - *s).num_days() < DEFAULT_CHUNK_DAYS);
        }
    }
}
