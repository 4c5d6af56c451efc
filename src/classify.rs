//! Exclusion policy applied to resolved filings.
//!
//! Form inclusion happens earlier, at the index stage (see [`crate::index::FormTypeFilter`]).
//! What remains here is the ban: an issuer is excluded by its SIC code or by a keyword in
//! its name or industry description.

use serde::{Deserialize, Serialize};

use super::artifacts::FilingRecord;

/// Inclusive SIC code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct SicRange {
    pub low: u32,
    pub high: u32,
}

impl SicRange {
    pub fn new(low: u32, high: u32) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, sic: u32) -> bool {
        self.low <= sic && sic <= self.high
    }
}

impl From<(u32, u32)> for SicRange {
    fn from((low, high): (u32, u32)) -> Self {
        Self { low, high }
    }
}

impl From<SicRange> for (u32, u32) {
    fn from(range: SicRange) -> Self {
        (range.low, range.high)
    }
}

/// Why a record was excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BanReason {
    /// SIC code inside a banned range.
    Sic(u32),
    /// The normalized keyword that matched.
    Keyword(String),
}

#[derive(Debug, Clone, Default)]
pub struct BanRule {
    sic_ranges: Vec<SicRange>,
    keywords: Vec<String>,
}

impl BanRule {
    /// Builds a rule; keywords are normalized and blank ones dropped.
    pub fn new(sic_ranges: impl IntoIterator<Item = SicRange>, keywords: &[String]) -> Self {
        let mut keywords: Vec<String> = keywords
            .iter()
            .map(|k| normalize(k))
            .filter(|k| !k.is_empty())
            .collect();
        keywords.dedup();
        Self {
            sic_ranges: sic_ranges.into_iter().collect(),
            keywords,
        }
    }

    pub fn sic_ranges(&self) -> &[SicRange] {
        &self.sic_ranges
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Returns the first reason `record` is banned, SIC before keywords.
    pub fn evaluate(&self, record: &FilingRecord) -> Option<BanReason> {
        if let Some(sic) = record
            .sic_code
            .filter(|sic| self.sic_ranges.iter().any(|r| r.contains(*sic)))
        {
            return Some(BanReason::Sic(sic));
        }

        let haystacks: Vec<String> = [Some(record.company_name.as_str()), record.industry.as_deref()]
            .into_iter()
            .flatten()
            .map(normalize)
            .filter(|h| !h.is_empty())
            .collect();

        self.keywords
            .iter()
            .find(|k| haystacks.iter().any(|h| h.contains(k.as_str())))
            .map(|k| BanReason::Keyword(k.clone()))
    }

    pub fn admit(&self, record: &FilingRecord) -> bool {
        self.evaluate(record).is_none()
    }
}

/// Lowercases and collapses runs of whitespace to one space.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
