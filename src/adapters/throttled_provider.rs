//! Chunked, rate-limited fetching over any [`PriceProvider`].

use crate::domain::date_range::split_date_range;
use crate::domain::error::MacrossError;
use crate::domain::price::PricePoint;
use crate::ports::provider_port::{PriceProvider, RateLimiter};
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Sorted ascending, one row per date.
    pub points: Vec<PricePoint>,
    pub chunks: usize,
    pub failed_chunks: Vec<(NaiveDate, NaiveDate)>,
}

pub struct ThrottledProvider<P, L> {
    provider: P,
    limiter: L,
    chunk_days: i64,
}

impl<P: PriceProvider, L: RateLimiter> ThrottledProvider<P, L> {
    pub fn new(provider: P, limiter: L, chunk_days: i64) -> Self {
        Self {
            provider,
            limiter,
            chunk_days,
        }
    }

    /// Requests each chunk of `[start, end]` in turn. A failing chunk is
    /// logged and recorded, and the remaining chunks are still fetched.
    pub fn fetch_range(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchOutcome, MacrossError> {
        let chunks = split_date_range(start, end, self.chunk_days)?;
        let mut rows = Vec::new();
        let mut failed_chunks = Vec::new();

        for (chunk_start, chunk_end) in &chunks {
            self.limiter.acquire();
            match self.provider.fetch_daily(code, *chunk_start, *chunk_end) {
                Ok(points) => {
                    info!(
                        "{}: fetched {} rows for {} to {}",
                        code,
                        points.len(),
                        chunk_start,
                        chunk_end
                    );
                    rows.extend(points);
                }
                Err(e) => {
                    warn!(
                        "{}: chunk {} to {} failed: {}",
                        code, chunk_start, chunk_end, e
                    );
                    failed_chunks.push((*chunk_start, *chunk_end));
                }
            }
        }

        // Stable sort keeps the earliest-fetched row first among equal dates.
        rows.sort_by_key(|p| p.date);
        let mut seen = HashSet::new();
        rows.retain(|p| seen.insert(p.date));

        Ok(FetchOutcome {
            points: rows,
            chunks: chunks.len(),
            failed_chunks,
        })
    }
}

impl<P: PriceProvider, L: RateLimiter> PriceProvider for ThrottledProvider<P, L> {
    /// Fails only when every chunk failed.
    fn fetch_daily(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, MacrossError> {
        let outcome = self.fetch_range(code, start_date, end_date)?;
        if outcome.chunks > 0 && outcome.failed_chunks.len() == outcome.chunks {
            return Err(MacrossError::Provider {
                code: code.to_string(),
                reason: format!("all {} chunks failed", outcome.chunks),
            });
        }
        Ok(outcome.points)
    }
}
