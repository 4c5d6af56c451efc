use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// One record of a master index, as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterIndexRow {
    pub cik: u64,
    pub company_name: String,
    pub form_type: String,
    /// `YYYYMMDD` in daily indices, `YYYY-MM-DD` in quarterly ones.
    pub date_filed: String,
    /// Path relative to the archives root, e.g. `edgar/data/1000045/0000950170-23-002704.txt`.
    pub filename: String,
}

impl MasterIndexRow {
    /// Dashed accession number named by the filename, if it has the canonical shape.
    pub fn accession(&self) -> Option<String> {
        accession_from_filename(&self.filename)
    }
}

/// Parser for EDGAR master index files (`master.YYYYMMDD.idx`, `master.idx`).
///
/// The layout is a free-text preamble, a column header, a dashed separator line, then
/// one pipe-delimited record per line:
///
/// ```text
/// CIK|Company Name|Form Type|Date Filed|Filename
/// --------------------------------------------------------------------------------
/// 1000045|NICHOLAS FINANCIAL INC|10-Q|20230214|edgar/data/1000045/0000950170-23-002704.txt
/// ```
///
/// Records that do not have five fields or a numeric CIK are skipped with a debug log;
/// one bad line never discards the rest of the day.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexParser;

impl IndexParser {
    const MAX_HEADER_LINES: usize = 50;

    /// Parses a master index.
    ///
    /// # Errors
    ///
    /// `ScanError::InvalidResponse` when no separator line appears in the first
    /// fifty lines, which is what an HTML error page served with a 200 looks like.
    pub fn parse<R: BufRead>(&self, reader: R) -> Result<Vec<MasterIndexRow>> {
        let mut lines = reader.lines();

        let mut found_separator = false;
        for line in lines.by_ref().take(Self::MAX_HEADER_LINES) {
            if is_separator(&line?) {
                found_separator = true;
                break;
            }
        }
        if !found_separator {
            return Err(ScanError::InvalidResponse(
                "master index has no separator line".to_string(),
            ));
        }

        let mut entries = Vec::new();
        for (offset, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() || is_separator(&line) {
                continue;
            }
            match Self::parse_line(&line) {
                Some(entry) => entries.push(entry),
                None => tracing::debug!(line = offset + 1, content = %line, "skipping malformed index line"),
            }
        }

        Ok(entries)
    }

    pub fn parse_str(&self, content: &str) -> Result<Vec<MasterIndexRow>> {
        self.parse(content.as_bytes())
    }

    fn parse_line(line: &str) -> Option<MasterIndexRow> {
        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        if fields.len() != 5 {
            return None;
        }

        let cik = fields[0].parse::<u64>().ok()?;
        if fields[2].is_empty() || fields[4].is_empty() {
            return None;
        }

        Some(MasterIndexRow {
            cik,
            company_name: fields[1].to_string(),
            form_type: fields[2].to_string(),
            date_filed: fields[3].to_string(),
            filename: fields[4].to_string(),
        })
    }
}

fn is_separator(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 3 && line.chars().all(|c| c == '-')
}

/// Extracts the dashed accession number from an index filename.
///
/// `edgar/data/1000045/0000950170-23-002704.txt` yields `0000950170-23-002704`.
pub fn accession_from_filename(filename: &str) -> Option<String> {
    let stem = filename.rsplit('/').next()?;
    let stem = stem.strip_suffix(".txt").unwrap_or(stem);
    is_accession(stem).then(|| stem.to_string())
}

/// `NNNNNNNNNN-NN-NNNNNN`.
pub fn is_accession(value: &str) -> bool {
    let parts: Vec<&str> = value.split('-').collect();
    matches!(parts.as_slice(), [filer, year, seq]
        if filer.len() == 10 && year.len() == 2 && seq.len() == 6
            && parts.iter().all(|p| p.bytes().all(|b| b.is_ascii_digit())))
}
