//! Cursor-based pagination for time-indexed endpoints
//!
//! The cursor starts at the requested start time and moves to the last
//! record's end time + 1 after every page. Pagination stops on:
//! - an empty page
//! - a short page (fewer records than the page limit)
//! - the cursor reaching the end boundary
//!
//! A cursor that fails to advance, or more than the iteration ceiling of
//! pages, is reported as [`FetcherError::Pagination`].

use crate::fetcher::{FetcherError, FetcherResult};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::downloader::config::MAX_PAGE_ITERATIONS;

/// Record that can drive a millisecond time cursor
pub trait CursorRecord {
    /// Start of the period covered by the record (ms since epoch)
    fn start_time_ms(&self) -> i64;

    /// Last millisecond of the period covered by the record
    fn end_time_ms(&self) -> i64;
}

/// Parameters for fetching one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    /// First millisecond to fetch
    pub cursor: i64,
    /// Exclusive end boundary, if any
    pub end_time: Option<i64>,
    /// Maximum records the provider should return
    pub limit: usize,
}

/// Pagination behaviour
#[derive(Debug, Clone)]
pub struct PaginationSettings {
    /// Records per page requested from the provider
    pub page_limit: usize,
    /// Pause between pages
    pub page_delay: Duration,
    /// Safety ceiling on pages
    pub max_iterations: usize,
}

impl PaginationSettings {
    /// Settings with the default iteration ceiling
    pub fn new(page_limit: usize, page_delay: Duration) -> Self {
        Self {
            page_limit,
            page_delay,
            max_iterations: MAX_PAGE_ITERATIONS,
        }
    }
}

/// Pagination helper
pub struct PaginationHelper;

impl PaginationHelper {
    /// Fetch every page for `instrument` in `[start_time, end_time)`
    ///
    /// # Arguments
    /// * `instrument` - Instrument name, used in logs and errors
    /// * `start_time` - Inclusive start (ms)
    /// * `end_time` - Exclusive end (ms); `None` pages until the provider runs out
    /// * `settings` - Page size, delay and iteration ceiling
    /// * `fetch_page` - Fetches one page for a [`PageQuery`]
    ///
    /// # Errors
    /// [`FetcherError::EmptyResult`] when no record falls in the range,
    /// [`FetcherError::Pagination`] when the cursor stalls or the ceiling is
    /// hit, and any error returned by `fetch_page`.
    pub async fn paginate<R, F, Fut>(
        instrument: &str,
        start_time: i64,
        end_time: Option<i64>,
        settings: &PaginationSettings,
        mut fetch_page: F,
    ) -> FetcherResult<Vec<R>>
    where
        R: CursorRecord,
        F: FnMut(PageQuery) -> Fut,
        Fut: Future<Output = FetcherResult<Vec<R>>>,
    {
        if settings.page_limit == 0 {
            return Err(FetcherError::Configuration(
                "page limit must be at least 1".to_string(),
            ));
        }

        let mut records: Vec<R> = Vec::new();
        let mut cursor = start_time;
        let mut iteration = 0;

        loop {
            if iteration >= settings.max_iterations {
                return Err(FetcherError::Pagination(format!(
                    "max iterations ({}) exceeded for {instrument}; last cursor: {cursor}",
                    settings.max_iterations
                )));
            }

            if end_time.is_some_and(|end| cursor >= end) {
                debug!("Cursor reached end boundary for {}", instrument);
                break;
            }

            let query = PageQuery {
                cursor,
                end_time,
                limit: settings.page_limit,
            };
            debug!(
                "Fetching page {} for {} from {} (end: {:?})",
                iteration + 1,
                instrument,
                cursor,
                end_time
            );

            let page = fetch_page(query).await?;
            let page_len = page.len();

            let next_cursor = match page.last() {
                Some(last) => last.end_time_ms().saturating_add(1),
                None => {
                    debug!("Empty page at iteration {} for {}", iteration + 1, instrument);
                    break;
                }
            };

            if next_cursor <= cursor {
                return Err(FetcherError::Pagination(format!(
                    "cursor did not advance for {instrument}: last record ends at {} but cursor is {cursor}",
                    next_cursor - 1
                )));
            }

            let window_start = cursor;
            records.extend(page.into_iter().filter(|record| {
                let start = record.start_time_ms();
                start >= window_start && end_time.map_or(true, |end| start < end)
            }));

            debug!(
                "Received {} records in page {} for {} ({} total)",
                page_len,
                iteration + 1,
                instrument,
                records.len()
            );

            cursor = next_cursor;
            iteration += 1;

            if page_len < settings.page_limit {
                debug!("Short page ({} < {}), end of stream", page_len, settings.page_limit);
                break;
            }
            if end_time.is_some_and(|end| cursor >= end) {
                break;
            }

            if !settings.page_delay.is_zero() {
                tokio::time::sleep(settings.page_delay).await;
            }
        }

        if records.is_empty() {
            return Err(FetcherError::EmptyResult {
                instrument: instrument.to_string(),
            });
        }

        debug!(
            "Pagination completed after {} pages for {}: {} records",
            iteration,
            instrument,
            records.len()
        );

        Ok(records)
    }
}
