//! Daily master indices.
//!
//! EDGAR publishes one master index per business day listing every filing disseminated
//! that day. A scan window spans at most two calendar days, so at most two indices are
//! read. Index dates approximate acceptance times, which is why candidates are confirmed
//! against their headers afterwards (see [`crate::resolver`]).
//!
//! This module implements [`IndexSource`] for [`SecClient`] and the stage that turns the
//! window's indices into candidate [`IndexEntry`] values.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::calendar::ScanWindow;
use super::client::SecClient;
use super::error::{Result, ScanError};
use super::parsing::index::{IndexParser, MasterIndexRow};
use super::stats::{IndexDayReport, RunStats};
use super::traits::IndexSource;

/// Fiscal quarter (Q1-Q4).
///
/// EDGAR index directories are grouped by quarter (`QTR1` .. `QTR4`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quarter {
    Q1 = 1,
    Q2 = 2,
    Q3 = 3,
    Q4 = 4,
}

impl Quarter {
    /// The quarter `day` falls in.
    pub fn of(day: NaiveDate) -> Self {
        match day.month0() / 3 {
            0 => Quarter::Q1,
            1 => Quarter::Q2,
            2 => Quarter::Q3,
            _ => Quarter::Q4,
        }
    }

    /// Converts the quarter to its integer representation (1-4).
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }
}

/// `{archives}/daily-index/{YYYY}/QTR{q}/master.{YYYYMMDD}.idx`
pub fn daily_index_url(archives_url: &str, day: NaiveDate) -> String {
    format!(
        "{}/daily-index/{}/QTR{}/master.{}.idx",
        archives_url.trim_end_matches('/'),
        day.year(),
        Quarter::of(day).as_i32(),
        day.format("%Y%m%d")
    )
}

/// A candidate filing taken from a daily index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub cik: u64,
    pub company_name: String,
    /// Normalized form type.
    pub form_type: String,
    /// Day of the index file the entry was read from.
    pub index_date: NaiveDate,
    /// `Date Filed` column as written.
    pub date_filed: String,
    /// Dashed accession number, e.g. `0000950170-23-002704`.
    pub accession_ref: String,
    pub filename: String,
}

/// Normalizes a form type: uppercase, single spaces, `SCHEDULE` spelled `SC`.
pub fn normalize_form_type(form: &str) -> String {
    let collapsed = form.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    match collapsed.strip_prefix("SCHEDULE ") {
        Some(rest) => format!("SC {rest}"),
        None => collapsed,
    }
}

/// The set of form types that become candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormTypeFilter {
    forms: BTreeSet<String>,
}

impl FormTypeFilter {
    pub fn new<S: AsRef<str>>(forms: &[S]) -> Self {
        Self {
            forms: forms
                .iter()
                .map(|f| normalize_form_type(f.as_ref()))
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    /// The normalized form type when it is included.
    pub fn accept(&self, form: &str) -> Option<String> {
        let normalized = normalize_form_type(form);
        self.forms.contains(&normalized).then_some(normalized)
    }
}

/// Converts one day's parsed rows into candidates, dropping excluded forms and rows whose
/// filename carries no accession number.
pub fn candidates_from_rows(
    rows: Vec<MasterIndexRow>,
    index_date: NaiveDate,
    filter: &FormTypeFilter,
) -> Vec<IndexEntry> {
    rows.into_iter()
        .filter_map(|row| {
            let form_type = filter.accept(&row.form_type)?;
            let Some(accession_ref) = row.accession() else {
                tracing::debug!(filename = %row.filename, "index filename has no accession number");
                return None;
            };
            Some(IndexEntry {
                cik: row.cik,
                company_name: row.company_name,
                form_type,
                index_date,
                date_filed: row.date_filed,
                accession_ref,
                filename: row.filename,
            })
        })
        .collect()
}

/// Reads the indices for every day of `window` and returns the candidates in index order.
///
/// Each day's outcome is recorded in `stats.index_days`. `stats.entries_seen` counts every
/// returned candidate before deduplication, so a filing listed under two CIKs counts twice.
///
/// # Errors
///
/// `ScanError::IndexUnavailable` when no day could be read. A single failing day is
/// logged and the run continues with the other.
pub async fn read_window<S: IndexSource + ?Sized>(
    source: &S,
    window: &ScanWindow,
    filter: &FormTypeFilter,
    stats: &mut RunStats,
) -> Result<Vec<IndexEntry>> {
    let parser = IndexParser;
    let days = window.index_days();
    let mut entries = Vec::new();
    let mut any_ok = false;

    for &day in &days {
        let parsed = match source.daily_index(day).await {
            Ok(content) => parser.parse_str(&content),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(rows) => {
                let total = rows.len();
                let candidates = candidates_from_rows(rows, day, filter);
                tracing::info!(%day, entries = total, candidates = candidates.len(), "read daily index");
                stats.record_index_day(IndexDayReport::ok(day, total, candidates.len()));
                entries.extend(candidates);
                any_ok = true;
            }
            Err(e) => {
                match &e {
                    ScanError::PermanentRequest { status: 404, .. } => {
                        tracing::info!(%day, "no daily index published")
                    }
                    _ => tracing::warn!(%day, error = %e, "daily index unavailable"),
                }
                stats.record_index_day(IndexDayReport::failed(day, &e));
            }
        }
    }

    if !any_ok {
        return Err(ScanError::IndexUnavailable { days });
    }

    stats.entries_seen += entries.len() as u64;
    Ok(entries)
}

#[async_trait]
impl IndexSource for SecClient {
    async fn daily_index(&self, day: NaiveDate) -> Result<String> {
        let url = daily_index_url(&self.archives_url, day);
        tracing::debug!(%url, "fetching daily index");
        self.fetch_text(&url).await
    }
}
