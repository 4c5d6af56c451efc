//! Run diagnostics, written to `sec_debug_stats.json` at the end of every run.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::calendar::ScanWindow;
use super::classify::BanReason;
use super::error::ScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Complete,
    Failed,
}

/// Outcome of reading one daily index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDayReport {
    pub day: NaiveDate,
    pub ok: bool,
    /// Records parsed from the file.
    pub entries: usize,
    /// Records that passed the form filter.
    pub candidates: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IndexDayReport {
    pub fn ok(day: NaiveDate, entries: usize, candidates: usize) -> Self {
        Self {
            day,
            ok: true,
            entries,
            candidates,
            error: None,
        }
    }

    pub fn failed(day: NaiveDate, error: &ScanError) -> Self {
        Self {
            day,
            ok: false,
            entries: 0,
            candidates: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Counters and markers accumulated over one run.
///
/// The consumer loop of the pipeline is the only writer. `retries_performed` lives in the
/// HTTP client while the run is in flight and is copied in when the run ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub status: RunStatus,
    pub failure_kind: Option<String>,
    pub failure_reason: Option<String>,

    pub window_start: Option<DateTime<FixedOffset>>,
    pub window_end: Option<DateTime<FixedOffset>>,
    pub trading_day: Option<NaiveDate>,
    pub timezone: String,

    /// Index records that passed the form filter, counted before deduplication. A Form 4
    /// listed under both the issuer and the owner counts twice; see `duplicates_dropped`.
    pub entries_seen: u64,
    pub entries_admitted: u64,
    pub entries_outside_window: u64,
    /// Header fetch or parse failures.
    pub entries_skipped: u64,
    pub entries_banned: u64,
    pub banned_sic: u64,
    pub banned_keyword: u64,
    pub duplicates_dropped: u64,
    pub enrichment_lookups: u64,
    pub enrichment_failures: u64,
    pub retries_performed: u64,
    pub records_written: u64,

    /// An admitted filing was accepted on the window's trading day.
    pub hit_boundary: bool,
    pub last_oldest_instant_scanned: Option<DateTime<FixedOffset>>,
    /// Index day that supplied the oldest admitted filing.
    pub source_primary: Option<NaiveDate>,
    pub index_days: Vec<IndexDayReport>,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub version: String,
}

impl RunStats {
    pub fn new(started_at: DateTime<Utc>, timezone: &str) -> Self {
        Self {
            status: RunStatus::Running,
            failure_kind: None,
            failure_reason: None,
            window_start: None,
            window_end: None,
            trading_day: None,
            timezone: timezone.to_string(),
            entries_seen: 0,
            entries_admitted: 0,
            entries_outside_window: 0,
            entries_skipped: 0,
            entries_banned: 0,
            banned_sic: 0,
            banned_keyword: 0,
            duplicates_dropped: 0,
            enrichment_lookups: 0,
            enrichment_failures: 0,
            retries_performed: 0,
            records_written: 0,
            hit_boundary: false,
            last_oldest_instant_scanned: None,
            source_primary: None,
            index_days: Vec::new(),
            started_at,
            finished_at: None,
            version: crate::VERSION.to_string(),
        }
    }

    pub fn set_window(&mut self, window: &ScanWindow) {
        self.window_start = Some(window.start().fixed_offset());
        self.window_end = Some(window.end().fixed_offset());
        self.trading_day = Some(window.trading_day());
        self.timezone = window.time_zone().name().to_string();
    }

    pub fn record_index_day(&mut self, report: IndexDayReport) {
        if report.ok && self.source_primary.is_none() {
            self.source_primary = Some(report.day);
        }
        self.index_days.push(report);
    }

    /// Tracks the oldest admitted instant and whether the window's trading day was reached.
    pub fn observe_admitted(
        &mut self,
        accepted: &DateTime<FixedOffset>,
        index_date: NaiveDate,
        window: &ScanWindow,
    ) {
        self.entries_admitted += 1;

        let is_older = self
            .last_oldest_instant_scanned
            .is_none_or(|oldest| *accepted < oldest);
        if is_older {
            self.last_oldest_instant_scanned = Some(*accepted);
            self.source_primary = Some(index_date);
        }

        if accepted.with_timezone(&window.time_zone()).date_naive() == window.trading_day() {
            self.hit_boundary = true;
        }
    }

    pub fn record_ban(&mut self, reason: &BanReason) {
        self.entries_banned += 1;
        match reason {
            BanReason::Sic(_) => self.banned_sic += 1,
            BanReason::Keyword(_) => self.banned_keyword += 1,
        }
    }

    pub fn finalize(&mut self, finished_at: DateTime<Utc>, retries_performed: u64) {
        self.status = RunStatus::Complete;
        self.finished_at = Some(finished_at);
        self.retries_performed = retries_performed;
    }

    pub fn fail(&mut self, error: &ScanError, finished_at: DateTime<Utc>, retries_performed: u64) {
        self.status = RunStatus::Failed;
        self.failure_kind = Some(error.kind().to_string());
        self.failure_reason = Some(error.to_string());
        self.finished_at = Some(finished_at);
        self.retries_performed = retries_performed;
    }

    /// A complete run that saw entries and reached the start of its window.
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Complete && self.hit_boundary && self.entries_seen > 0
    }
}
