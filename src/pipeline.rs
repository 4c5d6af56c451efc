//! One scan run, end to end.
//!
//! ```text
//! ScanWindow ─▶ read_window ─▶ dedup ─▶ [resolve ▸ enrich] × header_workers ─▶ ban ─▶ Artifacts
//! ```
//!
//! Header resolution and enrichment run through an ordered buffered stream, so results
//! arrive in index order however the workers interleave. The consumer loop below is the
//! only writer of [`RunStats`].

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use tokio::time::timeout;

use super::artifacts::{Artifacts, FilingRecord, write_stats_only};
use super::calendar::ScanWindow;
use super::client::SecClient;
use super::config::ScanConfig;
use super::enrichment::EnrichmentCache;
use super::error::{Result, ScanError};
use super::index::{self, FormTypeFilter, IndexEntry};
use super::resolver::{AcceptanceResolver, Resolution};
use super::stats::RunStats;
use super::traits::ScanSource;

/// What one finished run produced.
#[derive(Debug)]
pub struct RunReport {
    pub stats: RunStats,
    /// `None` when the run failed.
    pub artifacts: Option<Artifacts>,
    pub error: Option<ScanError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Records a run that failed before scanning, such as one with an invalid configuration.
///
/// Writes `sec_debug_stats.json` with `status = "failed"` into `output_dir`, removing any
/// snapshot files an earlier run left there, and returns the stats written.
pub fn record_startup_failure(
    output_dir: &Path,
    timezone: &str,
    error: &ScanError,
) -> Result<RunStats> {
    let now = Utc::now();
    let mut stats = RunStats::new(now, timezone);
    stats.fail(error, now, 0);
    tracing::error!(kind = error.kind(), error = %error, "run failed before scanning");
    write_stats_only(output_dir, &stats)?;
    Ok(stats)
}

enum Outcome {
    Admitted { record: FilingRecord, enriched: bool },
    Outside { entry: IndexEntry, accepted: DateTime<chrono_tz::Tz> },
    Skipped { entry: IndexEntry, error: ScanError },
}

/// Runs scans against a [`ScanSource`].
pub struct Scanner<S: ScanSource> {
    config: ScanConfig,
    source: S,
}

impl Scanner<SecClient> {
    /// Validates `config` and builds a scanner reading from EDGAR.
    pub fn new(config: ScanConfig) -> Result<Self> {
        config.validate()?;
        let client = SecClient::new(&config)?;
        Ok(Self::with_source(config, client))
    }
}

impl<S: ScanSource> Scanner<S> {
    pub fn with_source(config: ScanConfig, source: S) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The window a run invoked at `now` scans.
    pub fn window(&self, now: DateTime<Utc>) -> Result<ScanWindow> {
        ScanWindow::resolve(now, &self.config.calendar(), self.config.time_zone()?)
    }

    /// Runs one scan and writes its artifacts to the configured output directory.
    ///
    /// Never returns early: a fatal error still produces `sec_debug_stats.json` with
    /// `status = "failed"` and is reported in [`RunReport::error`].
    pub async fn run(&self, now: DateTime<Utc>) -> RunReport {
        let mut stats = RunStats::new(Utc::now(), &self.config.timezone);
        let budget = self.config.run_budget();

        let result = match self.window(now) {
            Ok(window) => {
                stats.set_window(&window);
                tracing::info!(
                    start = %window.start().to_rfc3339(),
                    end = %window.end().to_rfc3339(),
                    "scanning window"
                );
                match timeout(budget, self.scan(&window, &mut stats)).await {
                    Ok(result) => result,
                    Err(_) => Err(ScanError::RunBudgetExceeded(budget)),
                }
            }
            Err(e) => Err(e),
        };

        let output_dir = &self.config.output_dir;
        let written = result.and_then(|artifacts| {
            stats.finalize(Utc::now(), self.source.retries_performed());
            artifacts.write_to(output_dir, &stats)?;
            Ok(artifacts)
        });

        match written {
            Ok(artifacts) => {
                tracing::info!(
                    records = artifacts.len(),
                    seen = stats.entries_seen,
                    hit_boundary = stats.hit_boundary,
                    "run complete"
                );
                RunReport {
                    stats,
                    artifacts: Some(artifacts),
                    error: None,
                }
            }
            Err(error) => {
                stats.fail(&error, Utc::now(), self.source.retries_performed());
                tracing::error!(kind = error.kind(), error = %error, "run failed");
                if let Err(e) = write_stats_only(output_dir, &stats) {
                    tracing::error!(error = %e, "could not write stats artifact");
                }
                RunReport {
                    stats,
                    artifacts: None,
                    error: Some(error),
                }
            }
        }
    }

    /// Scans `window` and returns the artifact set, updating `stats` as it goes.
    ///
    /// # Errors
    ///
    /// Only run-level failures: `IndexUnavailable` when no index could be read. Filing
    /// level failures are counted in `stats` and the filing is skipped.
    pub async fn scan(&self, window: &ScanWindow, stats: &mut RunStats) -> Result<Artifacts> {
        let filter = FormTypeFilter::new(&self.config.form_types);
        let entries = index::read_window(&self.source, window, &filter, stats).await?;

        let mut seen = HashSet::new();
        let mut candidates = Vec::with_capacity(entries.len());
        for entry in entries {
            if seen.insert(entry.accession_ref.clone()) {
                candidates.push(entry);
            } else {
                tracing::debug!(accession = %entry.accession_ref, "duplicate index entry");
                stats.duplicates_dropped += 1;
            }
        }
        tracing::info!(candidates = candidates.len(), "resolving acceptance times");

        let resolver = AcceptanceResolver::new(&self.source, window);
        let cache = EnrichmentCache::new();
        let ban_rule = self.config.ban_rule();

        let mut outcomes = stream::iter(candidates)
            .map(|entry| self.process(&resolver, &cache, entry))
            .buffered(self.config.header_workers);

        let mut records = Vec::new();
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Outcome::Admitted { record, enriched } => {
                    stats.observe_admitted(&record.accepted_instant, record.index_date, window);
                    if !enriched {
                        stats.enrichment_failures += 1;
                    }
                    match ban_rule.evaluate(&record) {
                        Some(reason) => {
                            tracing::debug!(accession = %record.accession_ref, ?reason, "banned");
                            stats.record_ban(&reason);
                        }
                        None => records.push(record),
                    }
                }
                Outcome::Outside { entry, accepted } => {
                    tracing::debug!(
                        accession = %entry.accession_ref,
                        accepted = %accepted.to_rfc3339(),
                        "accepted outside window"
                    );
                    stats.entries_outside_window += 1;
                }
                Outcome::Skipped { entry, error } => {
                    tracing::warn!(accession = %entry.accession_ref, error = %error, "skipping filing");
                    stats.entries_skipped += 1;
                }
            }
        }
        stats.enrichment_lookups = cache.lookups();

        let artifacts = Artifacts::build(records);
        stats.duplicates_dropped += artifacts.duplicates_dropped() as u64;
        stats.records_written = artifacts.len() as u64;
        Ok(artifacts)
    }

    async fn process(
        &self,
        resolver: &AcceptanceResolver<'_, S>,
        cache: &EnrichmentCache,
        entry: IndexEntry,
    ) -> Outcome {
        match resolver.resolve(&entry).await {
            Ok(Resolution::Admitted(draft)) => {
                let enrichment = cache.enrich(&self.source, draft.cik()).await;
                Outcome::Admitted {
                    enriched: enrichment.resolved,
                    record: draft.into_record(&enrichment),
                }
            }
            Ok(Resolution::OutsideWindow(accepted)) => Outcome::Outside { entry, accepted },
            Err(error) => Outcome::Skipped { entry, error },
        }
    }
}
