//! Sequential batch executor

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::downloader::{DownloadError, IngestJob, JobReport};
use crate::fetcher::{FetcherError, HistoricalFetcher};
use crate::normalize::normalize;
use crate::output::{CsvTableWriter, OutputWriter};

static CSV_WRITER: CsvTableWriter = CsvTableWriter;

/// Progress bar over the instruments of a batch
pub fn batch_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Runs ingest jobs one at a time against a single fetcher
pub struct BatchExecutor<'a> {
    fetcher: &'a dyn HistoricalFetcher,
    writer: &'a dyn OutputWriter,
    instrument_delay: Duration,
    progress: Option<ProgressBar>,
}

impl<'a> BatchExecutor<'a> {
    /// Executor writing CSV files, with no delay between instruments
    pub fn new(fetcher: &'a dyn HistoricalFetcher) -> Self {
        Self {
            fetcher,
            writer: &CSV_WRITER,
            instrument_delay: Duration::ZERO,
            progress: None,
        }
    }

    /// Sleep between consecutive instruments
    pub fn with_instrument_delay(mut self, delay: Duration) -> Self {
        self.instrument_delay = delay;
        self
    }

    /// Use a different output writer
    pub fn with_writer(mut self, writer: &'a dyn OutputWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Report progress on `progress` (one tick per instrument)
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run every job in order
    ///
    /// # Errors
    /// The first fetch, normalization or write error aborts the batch.
    pub async fn run(&self, jobs: &[IngestJob]) -> Result<Vec<JobReport>, DownloadError> {
        let mut reports = Vec::with_capacity(jobs.len());

        for (index, job) in jobs.iter().enumerate() {
            if index > 0 && !self.instrument_delay.is_zero() {
                debug!(
                    "Waiting {:.1} seconds before next instrument",
                    self.instrument_delay.as_secs_f64()
                );
                tokio::time::sleep(self.instrument_delay).await;
            }

            if let Some(pb) = &self.progress {
                pb.set_message(job.request.instrument.clone());
            }

            match self.run_job(job).await {
                Ok(report) => {
                    if let Some(pb) = &self.progress {
                        pb.inc(1);
                    }
                    reports.push(report);
                }
                Err(e) => {
                    error!("Ingest failed for {}: {}", job.request.instrument, e);
                    if let Some(pb) = &self.progress {
                        pb.abandon_with_message(format!("failed on {}", job.request.instrument));
                    }
                    return Err(e);
                }
            }
        }

        if let Some(pb) = &self.progress {
            pb.finish_with_message("done");
        }

        Ok(reports)
    }

    async fn run_job(&self, job: &IngestJob) -> Result<JobReport, DownloadError> {
        let request = &job.request;
        info!("Ingesting {} ({})", request.instrument, request.resolution);

        let fetched = self.fetcher.fetch(request).await?;
        if let Some(degradation) = &fetched.degradation {
            warn!("Degraded result for {}: {}", request.instrument, degradation);
        }

        let table = normalize(&fetched.raw)?;
        if table.is_empty() {
            return Err(FetcherError::EmptyResult {
                instrument: request.instrument.clone(),
            }
            .into());
        }

        let rows_written = self.writer.write_table(&table, &job.output_path)?;
        info!("{} rows saved to {}", rows_written, job.output_path.display());

        Ok(JobReport {
            instrument: request.instrument.clone(),
            resolution: request.resolution.clone(),
            provider: self.fetcher.provider().to_string(),
            rows_written,
            output_path: job.output_path.clone(),
            degradation: fetched.degradation,
            attempts: fetched.attempts,
            credential_fallbacks: fetched.credential_fallbacks,
        })
    }
}
