//! Filing header parser.
//!
//! EDGAR serves each filing's header in two layouts. The `.hdr.sgml` file uses tags:
//!
//! ```text
//! <SEC-HEADER>0000950170-25-002704.hdr.sgml : 20250908
//! <ACCEPTANCE-DATETIME>20250908100012
//! <ACCESSION-NUMBER>0000950170-25-002704
//! <TYPE>10-Q
//! ```
//!
//! while the header block of the full `.txt` submission uses `KEY:<tab>value` lines:
//!
//! ```text
//! ACCESSION NUMBER:		0000950170-25-002704
//! CONFORMED SUBMISSION TYPE:	10-Q
//! ```
//!
//! Both are read into the same [`FilingHeader`]. Parsing stops at `</SEC-HEADER>`.
//!
//! Ownership forms and schedules name several parties. A Form 4 lists each
//! `REPORTING-OWNER` and then the `ISSUER`; a Schedule 13D lists the `SUBJECT-COMPANY` and
//! the `FILED-BY` party. The issuer or subject block is kept apart as [`SubjectCompany`] so
//! the record describes the company the filing is about, not the insider who filed it.

use std::collections::BTreeMap;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::{America::New_York, Tz};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// Zone EDGAR records `ACCEPTANCE-DATETIME` in.
pub const SOURCE_TIME_ZONE: Tz = New_York;

const ACCEPTANCE: &[&str] = &["ACCEPTANCE-DATETIME"];
const ACCESSION: &[&str] = &["ACCESSION-NUMBER", "ACCESSION NUMBER"];
const FORM_TYPE: &[&str] = &["TYPE", "CONFORMED SUBMISSION TYPE"];
const FILING_DATE: &[&str] = &["FILING-DATE", "FILED AS OF DATE"];
const PERIOD: &[&str] = &["PERIOD", "CONFORMED PERIOD OF REPORT"];
const COMPANY_NAME: &[&str] = &["CONFORMED-NAME", "COMPANY CONFORMED NAME"];
const CIK: &[&str] = &["CIK", "CENTRAL INDEX KEY"];
const SIC: &[&str] = &["ASSIGNED-SIC", "STANDARD INDUSTRIAL CLASSIFICATION"];
const INDUSTRY: &[&str] = &["STANDARD INDUSTRIAL CLASSIFICATION"];

// Party blocks, in both layouts.
const PARTY_SECTIONS: &[&str] = &[
    "FILER",
    "FILED-BY",
    "FILED BY",
    "REPORTING-OWNER",
    "ISSUER",
    "SUBJECT-COMPANY",
    "SUBJECT COMPANY",
];
const SUBJECT_SECTIONS: &[&str] = &["ISSUER", "SUBJECT-COMPANY", "SUBJECT COMPANY"];

/// The company a filing is about: the `ISSUER` of an ownership form or the
/// `SUBJECT-COMPANY` of a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectCompany {
    pub cik: u64,
    pub name: Option<String>,
    pub sic_code: Option<u32>,
    pub industry: Option<String>,
}

/// Typed view of a filing header.
///
/// Only `acceptance` is required. Company fields come from the [`SubjectCompany`] when the
/// header has one and from the first company block otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingHeader {
    /// Civil time in [`SOURCE_TIME_ZONE`].
    pub acceptance: NaiveDateTime,
    pub accession_number: Option<String>,
    pub form_type: Option<String>,
    pub filing_date: Option<NaiveDate>,
    pub period: Option<NaiveDate>,
    pub company_name: Option<String>,
    pub cik: Option<u64>,
    pub sic_code: Option<u32>,
    pub industry: Option<String>,
    pub subject: Option<SubjectCompany>,
    /// Every `KEY -> value` pair seen, first occurrence wins.
    pub fields: BTreeMap<String, String>,
}

impl FilingHeader {
    /// Parses header text in either layout.
    ///
    /// # Errors
    ///
    /// `ScanError::HeaderParse` when `ACCEPTANCE-DATETIME` is missing or is not
    /// `YYYYMMDDhhmmss`.
    pub fn parse(text: &str) -> Result<Self> {
        let (fields, subject_fields) = collect_fields(text);

        let raw_acceptance = lookup(&fields, ACCEPTANCE).ok_or_else(|| {
            ScanError::HeaderParse("missing ACCEPTANCE-DATETIME".to_string())
        })?;
        let acceptance = parse_acceptance(raw_acceptance)?;

        let subject = lookup(&subject_fields, CIK)
            .and_then(|v| v.parse().ok())
            .map(|cik| SubjectCompany {
                cik,
                name: lookup(&subject_fields, COMPANY_NAME).map(str::to_string),
                sic_code: lookup(&subject_fields, SIC).and_then(sic_from_value),
                industry: lookup(&subject_fields, INDUSTRY).and_then(industry_from_value),
            });

        // A subject company's SIC is never replaced by a filer's.
        let (sic_code, industry) = match &subject {
            Some(subject) => (subject.sic_code, subject.industry.clone()),
            None => (
                lookup(&fields, SIC).and_then(sic_from_value),
                lookup(&fields, INDUSTRY).and_then(industry_from_value),
            ),
        };

        Ok(Self {
            acceptance,
            accession_number: lookup(&fields, ACCESSION).map(str::to_string),
            form_type: lookup(&fields, FORM_TYPE).map(str::to_string),
            filing_date: lookup(&fields, FILING_DATE).and_then(parse_compact_date),
            period: lookup(&fields, PERIOD).and_then(parse_compact_date),
            company_name: subject
                .as_ref()
                .and_then(|s| s.name.clone())
                .or_else(|| lookup(&fields, COMPANY_NAME).map(str::to_string)),
            cik: subject
                .as_ref()
                .map(|s| s.cik)
                .or_else(|| lookup(&fields, CIK).and_then(|v| v.parse().ok())),
            sic_code,
            industry,
            subject,
            fields,
        })
    }

    /// The acceptance instant expressed in `tz`.
    ///
    /// A time repeated by the autumn clock change resolves to its earlier occurrence.
    ///
    /// # Errors
    ///
    /// `ScanError::HeaderParse` for a civil time skipped by the spring clock change.
    pub fn accepted_at(&self, tz: Tz) -> Result<DateTime<Tz>> {
        let source = match SOURCE_TIME_ZONE.from_local_datetime(&self.acceptance) {
            LocalResult::Single(instant) => instant,
            LocalResult::Ambiguous(earliest, _) => earliest,
            LocalResult::None => {
                return Err(ScanError::HeaderParse(format!(
                    "acceptance {} does not exist in {}",
                    self.acceptance, SOURCE_TIME_ZONE
                )));
            }
        };
        Ok(source.with_timezone(&tz))
    }
}

/// Parses `YYYYMMDDhhmmss`.
pub fn parse_acceptance(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    if value.len() != 14 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ScanError::HeaderParse(format!(
            "malformed ACCEPTANCE-DATETIME {value:?}"
        )));
    }
    NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%S").map_err(|e| {
        ScanError::HeaderParse(format!("malformed ACCEPTANCE-DATETIME {value:?}: {e}"))
    })
}

/// Returns every field, and separately the fields inside the subject block.
fn collect_fields(text: &str) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let mut fields = BTreeMap::new();
    let mut subject = BTreeMap::new();
    let mut in_subject = false;

    for line in text.lines() {
        let line = line.trim();
        if line.eq_ignore_ascii_case("</SEC-HEADER>") {
            break;
        }
        if let Some(section) = section_start(line) {
            if PARTY_SECTIONS.contains(&section.as_str()) {
                in_subject = SUBJECT_SECTIONS.contains(&section.as_str());
            }
            continue;
        }
        if let Some(section) = section_end(line) {
            if SUBJECT_SECTIONS.contains(&section.as_str()) {
                in_subject = false;
            }
            continue;
        }
        if let Some((key, value)) = split_tagged(line).or_else(|| split_keyed(line)) {
            if in_subject {
                subject.entry(key.clone()).or_insert_with(|| value.clone());
            }
            fields.entry(key).or_insert(value);
        }
    }

    (fields, subject)
}

// <ISSUER> or ISSUER:
fn section_start(line: &str) -> Option<String> {
    let name = match line.strip_prefix('<') {
        Some(rest) => rest.strip_suffix('>').filter(|n| !n.starts_with('/'))?,
        None => line.strip_suffix(':')?,
    };
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_ascii_uppercase())
}

// </ISSUER>
fn section_end(line: &str) -> Option<String> {
    let name = line.strip_prefix("</")?.strip_suffix('>')?;
    Some(name.trim().to_ascii_uppercase())
}

// <TAG>value
fn split_tagged(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix('<')?;
    if rest.starts_with('/') {
        return None;
    }
    let (tag, value) = rest.split_once('>')?;
    let value = value.trim();
    if tag.is_empty() || value.is_empty() {
        return None;
    }
    Some((tag.trim().to_ascii_uppercase(), value.to_string()))
}

// KEY:\tvalue
fn split_keyed(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    let value = value.trim();
    let is_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, ' ' | '-' | '_'));
    if !is_key || value.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

fn lookup<'a>(fields: &'a BTreeMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| fields.get(*k))
        .map(String::as_str)
}

fn parse_compact_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d").ok()
}

// "7372" or "SERVICES-PREPACKAGED SOFTWARE [7372]"
fn sic_from_value(value: &str) -> Option<u32> {
    let code = match (value.rfind('['), value.rfind(']')) {
        (Some(open), Some(close)) if open < close => &value[open + 1..close],
        _ => value,
    };
    code.trim().parse().ok().filter(|sic| *sic > 0)
}

fn industry_from_value(value: &str) -> Option<String> {
    let description = value.split('[').next().unwrap_or_default().trim();
    (!description.is_empty()).then(|| description.to_string())
}
