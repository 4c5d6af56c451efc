//! The async seams the scan pipeline reads through.
//!
//! The pipeline never talks to HTTP directly. It asks an [`IndexSource`] for the day's
//! master index, a [`HeaderSource`] for each filing's header, and a [`ProfileSource`] for
//! issuer metadata. [`SecClient`](crate::SecClient) implements all three against EDGAR;
//! tests substitute in-memory sources.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::enrichment::{IssuerProfile, TickerMap};
use super::error::Result;

/// Supplies the raw text of a daily master index.
#[async_trait]
pub trait IndexSource: Send + Sync {
    /// Raw `master.YYYYMMDD.idx` content for `day`.
    async fn daily_index(&self, day: NaiveDate) -> Result<String>;
}

/// Supplies the header document of a single filing.
#[async_trait]
pub trait HeaderSource: Send + Sync {
    /// Raw `.hdr.sgml` content for the filing `accession` made by `cik`.
    async fn filing_header(&self, cik: u64, accession: &str) -> Result<String>;
}

/// Supplies issuer metadata.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn issuer_profile(&self, cik: u64) -> Result<IssuerProfile>;

    /// Fallback tickers for issuers whose profile lists none. Read at most once per run.
    async fn ticker_map(&self) -> Result<TickerMap> {
        Ok(TickerMap::new())
    }
}

/// Everything one scan run reads from.
pub trait ScanSource: IndexSource + HeaderSource + ProfileSource {
    /// Transport-level retries performed so far, reported in the run diagnostics.
    fn retries_performed(&self) -> u64 {
        0
    }
}
