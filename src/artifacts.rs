//! Output artifacts of a run.
//!
//! | file                         | content                                      |
//! |------------------------------|----------------------------------------------|
//! | `sec_filings_snapshot.json`  | array of [`SnapshotRow`]                     |
//! | `sec_filings_snapshot.csv`   | the same rows with a fixed header            |
//! | `sec_filings_raw.json`       | array of [`FilingRecord`], header fields kept |
//! | `sec_debug_stats.json`       | [`RunStats`]                                 |
//!
//! Given the same records, every artifact except the stats file is byte-identical across
//! builds. Each file is written to a temporary sibling and renamed into place, so readers
//! never observe a half-written file.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use super::error::Result;
use super::stats::RunStats;

pub const SNAPSHOT_JSON: &str = "sec_filings_snapshot.json";
pub const SNAPSHOT_CSV: &str = "sec_filings_snapshot.csv";
pub const RAW_JSON: &str = "sec_filings_raw.json";
pub const STATS_JSON: &str = "sec_debug_stats.json";

/// Every file name a run may produce; an uploader accepts nothing else.
pub const ARTIFACT_NAMES: [&str; 4] = [SNAPSHOT_JSON, SNAPSHOT_CSV, RAW_JSON, STATS_JSON];

const CSV_HEADER: [&str; 6] = ["company", "ticker", "industry", "form", "accepted_et", "cik"];

/// A filing admitted into the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRecord {
    pub cik: u64,
    pub company_name: String,
    pub ticker: Option<String>,
    pub industry: Option<String>,
    pub sic_code: Option<u32>,
    pub form_type: String,
    #[serde(with = "accepted_format")]
    pub accepted_instant: DateTime<FixedOffset>,
    pub accession_ref: String,
    pub index_date: NaiveDate,
    pub raw_header_fields: BTreeMap<String, String>,
}

impl FilingRecord {
    pub fn snapshot_row(&self) -> SnapshotRow {
        SnapshotRow {
            company: self.company_name.clone(),
            ticker: self.ticker.clone(),
            industry: self.industry.clone(),
            form: self.form_type.clone(),
            accepted_et: accepted_format::format(&self.accepted_instant),
            cik: format!("{:010}", self.cik),
        }
    }

    #[cfg(test)]
    pub(crate) fn sample(accession_ref: &str, accepted: &str) -> Self {
        Self {
            cik: 1000045,
            company_name: "NICHOLAS FINANCIAL INC".to_string(),
            ticker: None,
            industry: None,
            sic_code: None,
            form_type: "8-K".to_string(),
            accepted_instant: DateTime::parse_from_rfc3339(accepted).unwrap(),
            accession_ref: accession_ref.to_string(),
            index_date: NaiveDate::from_ymd_opt(2025, 9, 8).unwrap(),
            raw_header_fields: BTreeMap::new(),
        }
    }
}

/// One line of the published snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub company: String,
    pub ticker: Option<String>,
    pub industry: Option<String>,
    pub form: String,
    /// RFC 3339 with the configured zone's offset, whole seconds.
    pub accepted_et: String,
    /// Zero-padded to 10 digits.
    pub cik: String,
}

/// Serde helpers for acceptance instants (`2025-09-08T10:00:12-04:00`).
mod accepted_format {
    use chrono::{DateTime, FixedOffset, SecondsFormat};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn format(instant: &DateTime<FixedOffset>) -> String {
        instant.to_rfc3339_opts(SecondsFormat::Secs, false)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s).map_err(serde::de::Error::custom)
    }

    pub fn serialize<S>(instant: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(instant))
    }
}

/// The ordered, deduplicated record set of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifacts {
    records: Vec<FilingRecord>,
    duplicates_dropped: usize,
}

impl Artifacts {
    /// Keeps the first record per `accession_ref`, then sorts by acceptance instant with
    /// the accession number as tie-breaker.
    pub fn build(records: impl IntoIterator<Item = FilingRecord>) -> Self {
        let mut seen = HashSet::new();
        let mut duplicates_dropped = 0;
        let mut kept: Vec<FilingRecord> = records
            .into_iter()
            .filter(|r| {
                let first = seen.insert(r.accession_ref.clone());
                if !first {
                    duplicates_dropped += 1;
                }
                first
            })
            .collect();

        kept.sort_by(|a, b| {
            a.accepted_instant
                .cmp(&b.accepted_instant)
                .then_with(|| a.accession_ref.cmp(&b.accession_ref))
        });

        Self {
            records: kept,
            duplicates_dropped,
        }
    }

    pub fn records(&self) -> &[FilingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates_dropped
    }

    pub fn rows(&self) -> Vec<SnapshotRow> {
        self.records.iter().map(FilingRecord::snapshot_row).collect()
    }

    pub fn snapshot_json(&self) -> Result<String> {
        to_json(&self.rows())
    }

    pub fn raw_json(&self) -> Result<String> {
        to_json(&self.records)
    }

    /// RFC 4180 text with `\n` line endings.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_csv_line(&mut out, &CSV_HEADER);
        for row in self.rows() {
            push_csv_line(
                &mut out,
                &[
                    row.company.as_str(),
                    row.ticker.as_deref().unwrap_or_default(),
                    row.industry.as_deref().unwrap_or_default(),
                    row.form.as_str(),
                    row.accepted_et.as_str(),
                    row.cik.as_str(),
                ],
            );
        }
        out
    }

    /// Writes all four artifacts into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path, stats: &RunStats) -> Result<()> {
        fs::create_dir_all(dir)?;
        write_atomic(dir, SNAPSHOT_JSON, self.snapshot_json()?.as_bytes())?;
        write_atomic(dir, SNAPSHOT_CSV, self.to_csv().as_bytes())?;
        write_atomic(dir, RAW_JSON, self.raw_json()?.as_bytes())?;
        write_atomic(dir, STATS_JSON, to_json(stats)?.as_bytes())?;
        tracing::info!(dir = %dir.display(), records = self.len(), "wrote artifacts");
        Ok(())
    }
}

/// Writes only the stats artifact, for runs that ended in a fatal error.
///
/// Snapshot files left by an earlier run are removed first, so the directory never pairs
/// a failed run's stats with older data.
pub fn write_stats_only(dir: &Path, stats: &RunStats) -> Result<()> {
    fs::create_dir_all(dir)?;
    remove_snapshot_files(dir)?;
    write_atomic(dir, STATS_JSON, to_json(stats)?.as_bytes())
}

/// Deletes the snapshot, CSV and raw artifacts from `dir`. Missing files are fine.
pub fn remove_snapshot_files(dir: &Path) -> Result<()> {
    for name in [SNAPSHOT_JSON, SNAPSHOT_CSV, RAW_JSON] {
        match fs::remove_file(dir.join(name)) {
            Ok(()) => tracing::debug!(file = name, "removed stale artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}

fn write_atomic(dir: &Path, name: &str, contents: &[u8]) -> Result<()> {
    let target = dir.join(name);
    let staging = dir.join(format!(".{name}.tmp"));
    fs::write(&staging, contents)?;
    fs::rename(&staging, &target)?;
    Ok(())
}

fn push_csv_line(out: &mut String, fields: &[&str]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}
