//! # edgarsnap - daily snapshot of SEC EDGAR filings
//!
//! edgarsnap answers one question per run: which 8-K, 6-K, 10-Q, 10-K, Form 3/4 and
//! Schedule 13D/G filings were accepted by EDGAR between 09:30 on the previous trading
//! day and 09:00 the next morning? The answer is written as a small set of artifacts that
//! are identical for every re-run over the same window.
//!
//! ## Pipeline
//!
//! - **Window** - [`ScanWindow`] from the invocation instant and a [`TradingCalendar`]
//! - **Index** - the daily master indices covering the window, filtered by form type
//! - **Acceptance** - each candidate's header, whose `ACCEPTANCE-DATETIME` decides admission
//! - **Enrichment** - ticker and industry from the issuer's submissions document, once per CIK,
//!   with `company_tickers.json` as the ticker fallback
//! - **Classification** - SIC range and keyword bans from [`BanRule`]
//! - **Artifacts** - snapshot JSON/CSV, raw JSON and run stats
//!
//! All traffic goes through one rate-limited [`SecClient`] that honours `Retry-After`.
//!
//! ## Basic Usage
//!
//! ```ignore
//! use chrono::Utc;
//! use edgarsnap::{ScanConfig, Scanner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // SEC fair access requires a contact in the User-Agent
//!     let config = ScanConfig::new("SnapshotBot ops@example.com");
//!     let scanner = Scanner::new(config)?;
//!
//!     let report = scanner.run(Utc::now()).await;
//!     println!("{} filings", report.stats.records_written);
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod calendar;
pub mod classify;
mod client;
mod config;
pub mod enrichment;
mod error;
pub mod index;
pub mod parsing;
mod pipeline;
pub mod resolver;
pub mod stats;
mod traits;

pub use artifacts::{ARTIFACT_NAMES, Artifacts, FilingRecord, SnapshotRow};
pub use calendar::{ScanWindow, TradingCalendar};
pub use classify::{BanReason, BanRule, SicRange};
pub use client::{RetryPolicy, SecClient, parse_retry_after};
pub use config::{DEFAULT_FORM_TYPES, ScanConfig, ScanUrls};
pub use enrichment::{CompanyTickers, Enrichment, EnrichmentCache, IssuerProfile, TickerMap};
pub use error::{Result, ScanError};
pub use index::{FormTypeFilter, IndexEntry};
pub use pipeline::{RunReport, Scanner, record_startup_failure};
pub use stats::{IndexDayReport, RunStats, RunStatus};
pub use traits::{HeaderSource, IndexSource, ProfileSource, ScanSource};

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
